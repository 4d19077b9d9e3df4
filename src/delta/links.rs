use scraper::{ElementRef, Html};

/// Extracts every hyperlink target from a fragment of markup.
///
/// The fragment is parsed with html5ever's error-recovering tree builder, so
/// unbalanced or otherwise broken markup still yields whatever links the
/// parser could place in the tree. Targets come back in document order,
/// duplicates included, exactly as written in the `href` attribute.
///
/// Markup without any elements (plain text, empty strings) yields an empty
/// vector.
///
/// # Examples
///
/// ```
/// use feedelta::delta::mine_links;
///
/// let links = mine_links(r#"<p>See <a href="/a">a</a> and <a href="/b">b</a></p>"#);
/// assert_eq!(links, vec!["/a", "/b"]);
/// ```
pub fn mine_links(markup: &str) -> Vec<String> {
    if markup.trim().is_empty() {
        return Vec::new();
    }

    let fragment = Html::parse_fragment(markup);

    fragment
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_owned)
        .collect()
}
