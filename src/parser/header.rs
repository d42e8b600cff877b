//! MIME header blocks: `Name: value` lines up to the first blank line.

use std::io::BufRead;

use crate::error::{ConvertError, Result};
use crate::model::part::HeaderMap;

/// Read one header block from `reader`.
///
/// Continuation lines (starting with space or tab) are folded into the
/// previous field. On success the reader is positioned at the first byte
/// after the blank line that ends the block.
pub fn read_header_block<R: BufRead + ?Sized>(reader: &mut R) -> Result<HeaderMap> {
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut raw = Vec::new();
    let mut line_no = 0usize;

    loop {
        raw.clear();
        let n = reader.read_until(b'\n', &mut raw).map_err(|e| {
            ConvertError::HeaderParse {
                part: None,
                line: line_no + 1,
                reason: e.to_string(),
            }
        })?;
        line_no += 1;

        if n == 0 {
            return Err(ConvertError::HeaderParse {
                part: None,
                line: line_no,
                reason: "unexpected end of input before end of headers".to_string(),
            });
        }

        let line = decode_header_bytes(trim_line_ending(&raw));
        if line.is_empty() {
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            let Some(last) = fields.last_mut() else {
                return Err(ConvertError::HeaderParse {
                    part: None,
                    line: line_no,
                    reason: "continuation line before first header".to_string(),
                });
            };
            let more = line.trim();
            if !more.is_empty() {
                if !last.1.is_empty() {
                    last.1.push(' ');
                }
                last.1.push_str(more);
            }
            continue;
        }

        let Some(colon) = line.find(':') else {
            return Err(ConvertError::HeaderParse {
                part: None,
                line: line_no,
                reason: format!("malformed header line: {:?}", truncate(&line, 60)),
            });
        };
        let name = &line[..colon];
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ConvertError::HeaderParse {
                part: None,
                line: line_no,
                reason: format!("invalid header name: {:?}", truncate(name, 60)),
            });
        }
        fields.push((name.to_string(), line[colon + 1..].trim().to_string()));
    }

    let mut headers = HeaderMap::new();
    for (name, value) in fields {
        headers.append(&name, value);
    }
    Ok(headers)
}

/// Strip a trailing `\n` or `\r\n`.
pub(crate) fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
