//! Point the HTML document's resource references at the persisted files.
//!
//! The document is parsed into a DOM with `html5ever`, `img`/`script`
//! (`src`) and `link` (`href`) attributes are rewritten where the current
//! value is a known `Content-Location`, and the DOM is serialized back.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Component, Path};
use std::rc::Rc;

use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::{StrTendril, TendrilSink};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use tracing::{debug, trace};

use crate::error::Result;
use crate::model::part::{LocationMap, RawPart};

/// Attributes that make a browser prefer some other (remote) source for an
/// image, or defer loading it.
const IMG_HINTS: [&str; 2] = ["loading", "srcset"];

/// Counts reported by [`HtmlDocument::rewrite_references`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RewriteStats {
    /// Attributes replaced with a local path.
    pub rewritten: usize,
    /// Resource attributes left as they were (no persisted file matched).
    pub unresolved: usize,
}

/// The primary HTML document of an archive, as a mutable DOM.
pub struct HtmlDocument {
    dom: RcDom,
}

impl HtmlDocument {
    /// Parse HTML text.
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        inline_template_contents(&dom.document);
        Self { dom }
    }

    /// Parse the body of an HTML part, honoring its `charset` parameter.
    pub fn from_part(part: &RawPart) -> Result<Self> {
        let charset = part
            .headers
            .content_type()?
            .and_then(|ct| ct.param("charset").map(str::to_string));
        Ok(Self::parse(&decode_html(&part.body, charset.as_deref())))
    }

    /// Rewrite `img`, `link` and `script` references found in `locations`.
    ///
    /// Mapped file paths are written relative to `document_dir` (the
    /// directory the rewritten HTML will be saved in) with `/` separators.
    /// Every `img` also loses its `loading` and `srcset` attributes.
    pub fn rewrite_references(&mut self, locations: &LocationMap, document_dir: &Path) -> RewriteStats {
        let hrefs: HashMap<&str, String> = locations
            .iter()
            .map(|(location, file)| (location.as_str(), local_href(file, document_dir)))
            .collect();

        let mut stats = RewriteStats::default();
        let mut stack: Vec<Handle> = vec![self.dom.document.clone()];
        while let Some(node) = stack.pop() {
            rewrite_element(&node, &hrefs, &mut stats);
            // Reversed so that elements are visited in document order.
            stack.extend(node.children.borrow().iter().rev().cloned());
        }

        debug!(
            rewritten = stats.rewritten,
            unresolved = stats.unresolved,
            "Rewrote resource references"
        );
        stats
    }

    /// Serialize the document to `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> std::io::Result<()> {
        let document: SerializableHandle = self.dom.document.clone().into();
        serialize(writer, &document, SerializeOpts::default())
    }

    /// Serialize the document to a string.
    pub fn to_html(&self) -> std::io::Result<String> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Move every `<template>`'s content fragment under the template element.
///
/// The parser keeps template content in a separate fragment that neither a
/// child walk nor the serializer visits.
fn inline_template_contents(document: &Handle) {
    let mut stack: Vec<Handle> = vec![document.clone()];
    while let Some(node) = stack.pop() {
        if let NodeData::Element {
            template_contents, ..
        } = &node.data
        {
            if let Some(fragment) = template_contents.borrow_mut().take() {
                let moved = fragment.children.take();
                for child in &moved {
                    child.parent.set(Some(Rc::downgrade(&node)));
                }
                node.children.borrow_mut().extend(moved);
            }
        }
        stack.extend(node.children.borrow().iter().cloned());
    }
}

fn rewrite_element(node: &Handle, hrefs: &HashMap<&str, String>, stats: &mut RewriteStats) {
    let NodeData::Element { name, attrs, .. } = &node.data else {
        return;
    };
    let tag = &*name.local;
    let target = match tag {
        "img" | "script" => "src",
        "link" => "href",
        _ => return,
    };

    let mut attrs = attrs.borrow_mut();
    if tag == "img" {
        attrs.retain(|a| !IMG_HINTS.contains(&&*a.name.local));
    }

    let Some(attr) = attrs.iter_mut().find(|a| &*a.name.local == target) else {
        return;
    };
    match hrefs.get(&*attr.value) {
        Some(href) => {
            trace!(tag, from = %&*attr.value, to = %href, "Rewriting reference");
            attr.value = StrTendril::from_slice(href);
            stats.rewritten += 1;
        }
        None => stats.unresolved += 1,
    }
}

/// How the rewritten document should refer to a persisted file.
fn local_href(file: &Path, document_dir: &Path) -> String {
    let relative = file.strip_prefix(document_dir).unwrap_or(file);
    if relative.is_absolute() {
        return escape_href(&relative.to_string_lossy().replace('\\', "/"));
    }
    let joined = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    escape_href(&joined)
}

/// Escape the characters that would end a URL path early.
fn escape_href(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            c => out.push(c),
        }
    }
    out
}

/// Decode HTML bytes using a declared charset (UTF-8 if absent or unknown).
///
/// A byte-order mark, if present, overrides the declared charset.
pub fn decode_html(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| encoding_rs::Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (decoded, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!(encoding = used.name(), "HTML contained undecodable bytes");
    }
    decoded.into_owned()
}
