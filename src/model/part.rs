//! Decoded MIME parts, their headers, and the location → file map.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{ConvertError, Result};
use crate::parser::media_type::MediaType;

/// A MIME header block.
///
/// Field names are case-insensitive and stored lowercased. A field may repeat,
/// so every name maps to the values in the order they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    fields: Vec<(String, Vec<String>)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `name`, keeping any earlier values.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        let key = name.to_ascii_lowercase();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.fields.push((key, vec![value])),
        }
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// All values for `name`, in header order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// Remove every value for `name`.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parsed `Content-Type`.
    ///
    /// A missing or blank header is `Ok(None)`; a present but unparseable one
    /// is a [`ConvertError::MediaTypeParse`].
    pub fn content_type(&self) -> Result<Option<MediaType>> {
        match self.get("content-type").map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => MediaType::parse(value).map(Some),
        }
    }
}

/// One section of the multipart body: its own headers and decoded body bytes.
#[derive(Debug, Clone)]
pub struct RawPart {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawPart {
    /// The media type of this part, failing if it has none.
    ///
    /// `index` is the part's position in decode order, used in the error.
    pub fn require_content_type(&self, index: usize) -> Result<MediaType> {
        self.headers
            .content_type()
            .map_err(|e| e.in_part(index))?
            .ok_or(ConvertError::MissingContentType { index: Some(index) })
    }

    /// The `Content-Location` the archiving browser recorded, if any.
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get("content-location")
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }
}

/// Original resource location → path of the file its body was written to.
pub type LocationMap = HashMap<String, PathBuf>;
