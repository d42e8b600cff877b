//! `Content-Type` values: `type/subtype` plus `; name=value` parameters.

use crate::error::{ConvertError, Result};

/// A parsed media type.
///
/// The essence and parameter names are lowercased; parameter values keep
/// their case (boundaries are case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    essence: String,
    params: Vec<(String, String)>,
}

impl MediaType {
    /// Parse a header value such as `multipart/related; boundary="abc"`.
    pub fn parse(value: &str) -> Result<Self> {
        let fail = |reason: &str| ConvertError::MediaTypeParse {
            part: None,
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let (essence, mut rest) = match value.find(';') {
            Some(pos) => (&value[..pos], &value[pos..]),
            None => (value, ""),
        };
        let essence = essence.trim().to_ascii_lowercase();
        let (main, sub) = essence
            .split_once('/')
            .ok_or_else(|| fail("expected type/subtype"))?;
        if !is_token(main) || !is_token(sub) {
            return Err(fail("invalid type or subtype"));
        }

        let mut params: Vec<(String, String)> = Vec::new();
        loop {
            rest = rest.trim_start();
            let Some(after_semi) = rest.strip_prefix(';') else {
                if rest.is_empty() {
                    break;
                }
                return Err(fail("expected ';' between parameters"));
            };
            rest = after_semi.trim_start();
            if rest.is_empty() {
                // Trailing semicolon
                break;
            }

            let eq = rest
                .find('=')
                .ok_or_else(|| fail("parameter without value"))?;
            let name = rest[..eq].trim().to_ascii_lowercase();
            if !is_token(&name) {
                return Err(fail("invalid parameter name"));
            }
            rest = rest[eq + 1..].trim_start();

            let (param_value, remaining) = if let Some(quoted) = rest.strip_prefix('"') {
                read_quoted(quoted).ok_or_else(|| fail("unterminated quoted string"))?
            } else {
                let end = rest
                    .find(|c: char| c == ';' || c.is_whitespace())
                    .unwrap_or(rest.len());
                let token = &rest[..end];
                if token.is_empty() {
                    return Err(fail("empty parameter value"));
                }
                (token.to_string(), &rest[end..])
            };
            rest = remaining;

            if params.iter().any(|(k, _)| *k == name) {
                return Err(fail("duplicate parameter"));
            }
            params.push((name, param_value));
        }

        Ok(Self { essence, params })
    }

    /// `type/subtype`, lowercased.
    pub fn essence(&self) -> &str {
        &self.essence
    }

    /// The part before the slash.
    pub fn main_type(&self) -> &str {
        self.essence.split('/').next().unwrap_or_default()
    }

    /// Value of a parameter (name is matched case-insensitively).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.main_type() == "multipart"
    }

    pub fn is_html(&self) -> bool {
        self.essence == "text/html"
    }
}

/// RFC 2045 token: printable ASCII without spaces or tspecials.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b)
        })
}

/// Read a quoted string (opening quote already consumed).
///
/// Returns the unescaped value and the input after the closing quote.
fn read_quoted(s: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((out, &s[i + 1..])),
            '\\' => out.push(chars.next()?.1),
            _ => out.push(c),
        }
    }
    None
}
