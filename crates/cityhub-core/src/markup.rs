//! Prompt normalization: the input box may hold pasted markup, the backends
//! only ever see plain text.

use scraper::{Html, Node};

/// Elements that start on a new line when flattened
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre",
];

/// Convert a possibly-marked-up prompt to trimmed plain text.
///
/// The input is parsed as an HTML fragment, so entities are decoded and a
/// bare `<` or `>` that does not open a tag is kept as text.
pub fn html_to_text(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let mut text = String::new();

    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(el) if el.name() == "br" => text.push('\n'),
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            _ => {}
        }
    }

    text.trim().to_string()
}
