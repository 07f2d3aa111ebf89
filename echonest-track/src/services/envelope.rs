//! Response envelope parsing
//!
//! Every response is an XML document of the shape
//!
//! ```xml
//! <response version="3">
//!   <status><code>0</code><message>Success</message></status>
//!   <query>...</query>
//!   <analysis>...</analysis>
//! </response>
//! ```
//!
//! Only `status/code` and the `analysis` payload are read.

use echonest_common::StatusCode;
use roxmltree::{Document, Node};
use std::str::FromStr;

use crate::error::{AnalysisError, AnalysisResult};

/// Read `status/code` from a response body
pub fn read_status(body: &str) -> AnalysisResult<StatusCode> {
    let doc = Document::parse(body)?;
    status_of(doc.root_element())
}

/// Parse a response body, failing on non-success status, and hand the
/// `analysis` element to `extract`
pub fn parse_analysis<T>(
    endpoint: &str,
    body: &str,
    extract: impl FnOnce(Node<'_, '_>) -> AnalysisResult<T>,
) -> AnalysisResult<T> {
    let doc = Document::parse(body)?;
    let root = doc.root_element();

    let status = status_of(root)?;
    if !status.is_success() {
        return Err(AnalysisError::protocol(endpoint, status));
    }

    extract(child(root, "analysis")?)
}

fn status_of(root: Node<'_, '_>) -> AnalysisResult<StatusCode> {
    let code_node = child(child(root, "status")?, "code")?;
    let code: i32 = parse_text(code_node)?;
    Ok(StatusCode::from(code))
}

/// First child element named `name`
pub(crate) fn child<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> AnalysisResult<Node<'a, 'input>> {
    opt_child(node, name).ok_or_else(|| {
        AnalysisError::Parse(format!(
            "<{}> has no <{}> element",
            node.tag_name().name(),
            name
        ))
    })
}

pub(crate) fn opt_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// Child elements in document order, whitespace text skipped
pub(crate) fn elements<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

/// Child element by position
pub(crate) fn nth_element<'a, 'input>(
    node: Node<'a, 'input>,
    index: usize,
) -> AnalysisResult<Node<'a, 'input>> {
    elements(node).nth(index).ok_or_else(|| {
        AnalysisError::Parse(format!(
            "<{}> has fewer than {} child elements",
            node.tag_name().name(),
            index + 1
        ))
    })
}

/// Element text, trimmed
pub(crate) fn text<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().map(str::trim).unwrap_or("")
}

pub(crate) fn parse_text<T: FromStr>(node: Node<'_, '_>) -> AnalysisResult<T> {
    let raw = text(node);
    raw.parse().map_err(|_| {
        AnalysisError::Parse(format!(
            "<{}> has unparseable content {:?}",
            node.tag_name().name(),
            raw
        ))
    })
}

pub(crate) fn parse_attr<T: FromStr>(node: Node<'_, '_>, attr: &str) -> AnalysisResult<T> {
    let raw = node.attribute(attr).ok_or_else(|| {
        AnalysisError::Parse(format!(
            "<{}> is missing attribute {:?}",
            node.tag_name().name(),
            attr
        ))
    })?;
    raw.trim().parse().map_err(|_| {
        AnalysisError::Parse(format!(
            "<{}> attribute {:?} has unparseable value {:?}",
            node.tag_name().name(),
            attr,
            raw
        ))
    })
}
