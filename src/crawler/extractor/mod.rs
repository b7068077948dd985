#[cfg(test)]
mod tests;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::{RagError, Result};

/// Elements whose whole subtree is dropped before reading text
pub const UNWANTED_TAGS: &str = "script, style, noscript, header, footer, nav, aside";

/// Elements preferred over `body` as the text source, first match in document order wins
const MAIN_CONTENT_TAGS: &str = "article, main";

/// Reduce a rendered HTML document to clean text.
///
/// Boilerplate subtrees are removed, the first `article` or `main` element is
/// preferred over `body`, and the text is normalised to one trimmed,
/// non-empty line per line of source text.
#[inline]
pub fn extract_text(html: &str) -> Result<String> {
    let mut document = Html::parse_document(html);
    remove_unwanted_elements(&mut document, &selector(UNWANTED_TAGS)?);

    let main_selector = selector(MAIN_CONTENT_TAGS)?;
    let body_selector = selector("body")?;

    let raw_text = match document.select(&main_selector).next() {
        Some(main) => element_text(main),
        None => match document.select(&body_selector).next() {
            Some(body) => element_text(body),
            None => document.root_element().text().collect(),
        },
    };

    let text = clean_text(&raw_text);
    debug!(
        "Extracted {} characters of text from {} bytes of HTML",
        text.chars().count(),
        html.len()
    );
    Ok(text)
}

/// Trim every line and drop the empty ones
#[inline]
pub fn clean_text(raw_text: &str) -> String {
    raw_text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| RagError::Scrape(format!("Invalid selector '{css}': {e}")))
}

fn remove_unwanted_elements(document: &mut Html, unwanted_selector: &Selector) {
    // collect first, detaching while selecting would alias the tree
    let unwanted_node_ids: Vec<_> = document
        .select(unwanted_selector)
        .map(|element| element.id())
        .collect();

    for node_id in unwanted_node_ids {
        if let Some(mut node) = document.tree.get_mut(node_id) {
            node.detach();
        }
    }
}
