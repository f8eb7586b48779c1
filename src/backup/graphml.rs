//! Reduced GraphML samples for the restore test import.
//!
//! The sample keeps the document's prolog (XML declaration, `<key>`
//! definitions, `<graph>` opening tag), the first nodes, and only edges whose
//! endpoints are both among those nodes, so the sample imports cleanly.

use std::collections::HashSet;

const FOOTER: &str = "</graph>\n</graphml>\n";

/// A sample document and what it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub xml: String,
    pub nodes: usize,
    pub edges: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Node,
    Edge,
}

/// One `<node>`/`<edge>` element, borrowed from the document.
struct Element<'a> {
    kind: Kind,
    text: &'a str,
}

/// Builds a sample holding at most `max_nodes` nodes and `max_edges` edges.
///
/// Returns `None` when the document has no graph elements.
pub fn build_sample(document: &str, max_nodes: usize, max_edges: usize) -> Option<Sample> {
    let first = find_element(document, 0)?;
    let prolog = &document[..first.0];

    let mut xml = String::from(prolog);
    let mut ids: HashSet<String> = HashSet::new();
    let mut edges = 0;

    let mut cursor = first.0;
    while let Some((start, element)) = find_element(document, cursor) {
        cursor = start + element.text.len();
        match element.kind {
            Kind::Node if ids.len() < max_nodes => {
                if let Some(id) = attribute(element.text, "id") {
                    ids.insert(id.to_string());
                }
                xml.push_str(element.text);
                xml.push('\n');
            }
            Kind::Edge if edges < max_edges => {
                let inside = |name: &str| attribute(element.text, name).is_some_and(|id| ids.contains(id));
                if inside("source") && inside("target") {
                    edges += 1;
                    xml.push_str(element.text);
                    xml.push('\n');
                }
            }
            _ => {}
        }
        if ids.len() >= max_nodes && edges >= max_edges {
            break;
        }
    }

    xml.push_str(FOOTER);
    Some(Sample {
        xml,
        nodes: ids.len(),
        edges,
    })
}

/// Finds the next `<node>` or `<edge>` element at or after `from`, stopping
/// at `</graph>`.
fn find_element(document: &str, from: usize) -> Option<(usize, Element<'_>)> {
    let mut pos = from;
    while let Some(offset) = document[pos..].find('<') {
        let start = pos + offset;
        let rest = &document[start..];
        if rest.starts_with("</graph") {
            return None;
        }
        let kind = if is_tag(rest, "<node") {
            Some(Kind::Node)
        } else if is_tag(rest, "<edge") {
            Some(Kind::Edge)
        } else {
            None
        };

        if let Some(kind) = kind {
            let close = match kind {
                Kind::Node => "</node>",
                Kind::Edge => "</edge>",
            };
            let open_end = rest.find('>')?;
            let len = if rest[..open_end].ends_with('/') {
                open_end + 1
            } else {
                rest.find(close)? + close.len()
            };
            return Some((
                start,
                Element {
                    kind,
                    text: &rest[..len],
                },
            ));
        }
        pos = start + 1;
    }
    None
}

fn is_tag(rest: &str, tag: &str) -> bool {
    rest.starts_with(tag)
        && rest[tag.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_whitespace() || c == '>' || c == '/')
}

/// Value of `name="..."` in an element's opening tag.
fn attribute<'a>(element: &'a str, name: &str) -> Option<&'a str> {
    let open_tag = &element[..element.find('>').unwrap_or(element.len())];
    let needle = format!(" {}=\"", name);
    let start = open_tag.find(&needle)? + needle.len();
    let len = open_tag[start..].find('"')?;
    Some(&open_tag[start..start + len])
}

/// Counts `<node>` and `<edge>` elements in a document.
pub fn count_elements(document: &str) -> (usize, usize) {
    let mut nodes = 0;
    let mut edges = 0;
    let mut cursor = 0;
    while let Some((start, element)) = find_element(document, cursor) {
        cursor = start + element.text.len();
        match element.kind {
            Kind::Node => nodes += 1,
            Kind::Edge => edges += 1,
        }
    }
    (nodes, edges)
}
