//! `Content-Transfer-Encoding` decoding for part bodies.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

/// Archivers are inconsistent about padding, so accept it either way.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decode `body` according to a `Content-Transfer-Encoding` value.
///
/// `7bit`, `8bit`, `binary` and unknown encodings pass through unchanged.
pub fn decode_body(encoding: Option<&str>, body: Vec<u8>) -> Result<Vec<u8>, String> {
    let encoding = encoding.map(|e| e.trim().to_ascii_lowercase());
    match encoding.as_deref() {
        Some("base64") => decode_base64(&body),
        Some("quoted-printable") => Ok(decode_quoted_printable(&body)),
        _ => Ok(body),
    }
}

/// Decode base64, ignoring line breaks and other ASCII whitespace.
pub fn decode_base64(input: &[u8]) -> Result<Vec<u8>, String> {
    let compact: Vec<u8> = input
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64
        .decode(&compact)
        .map_err(|e| format!("invalid base64: {e}"))
}

/// Decode quoted-printable (RFC 2045 §6.7).
///
/// Soft line breaks are removed, `=XX` becomes the byte it names, and
/// trailing whitespace on each line is dropped. Malformed escapes are kept
/// literally.
pub fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());

    for raw_line in input.split_inclusive(|&b| b == b'\n') {
        let (content, ending): (&[u8], &[u8]) = if let Some(c) = raw_line.strip_suffix(b"\r\n") {
            (c, &b"\r\n"[..])
        } else if let Some(c) = raw_line.strip_suffix(b"\n") {
            (c, &b"\n"[..])
        } else {
            (raw_line, &[][..])
        };
        let content = trim_trailing_blanks(content);

        let (content, soft_break) = match content.strip_suffix(b"=") {
            Some(c) => (c, true),
            None => (content, false),
        };

        let mut i = 0;
        while i < content.len() {
            match content[i] {
                b'=' => {
                    match hex_pair(content.get(i + 1).copied(), content.get(i + 2).copied()) {
                        Some(byte) => {
                            result.push(byte);
                            i += 3;
                        }
                        None => {
                            result.push(b'=');
                            i += 1;
                        }
                    }
                }
                b => {
                    result.push(b);
                    i += 1;
                }
            }
        }

        if !soft_break {
            result.extend_from_slice(ending);
        }
    }

    result
}

fn trim_trailing_blanks(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b' ' && b != b'\t')
        .map_or(0, |p| p + 1);
    &line[..end]
}

fn hex_pair(hi: Option<u8>, lo: Option<u8>) -> Option<u8> {
    let hi = (hi? as char).to_digit(16)?;
    let lo = (lo? as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_with_line_breaks() {
        let out = decode_body(Some("base64"), b"SGVsbG8g\r\nd29ybGQ=\r\n".to_vec()).unwrap();
        assert_eq!(out, b"Hello world");
    }

    #[test]
    fn test_base64_without_padding() {
        assert_eq!(decode_base64(b"SGk").unwrap(), b"Hi");
    }

    #[test]
    fn test_base64_garbage_is_error() {
        assert!(decode_base64(b"@@@@").is_err());
    }

    #[test]
    fn test_encoding_name_case_insensitive() {
        let out = decode_body(Some(" Base64 "), b"SGk=".to_vec()).unwrap();
        assert_eq!(out, b"Hi");
    }

    #[test]
    fn test_passthrough() {
        let body = b"<html>\r\n".to_vec();
        assert_eq!(decode_body(None, body.clone()).unwrap(), body);
        assert_eq!(decode_body(Some("8bit"), body.clone()).unwrap(), body);
        assert_eq!(decode_body(Some("binary"), body.clone()).unwrap(), body);
    }

    #[test]
    fn test_quoted_printable() {
        let input = b"<p class=3D\"x\">caf=C3=A9 long=\r\nline</p>   \r\nend";
        assert_eq!(
            decode_quoted_printable(input),
            "<p class=\"x\">café longline</p>\r\nend".as_bytes()
        );
    }

    #[test]
    fn test_quoted_printable_bad_escape_kept() {
        assert_eq!(decode_quoted_printable(b"a=ZZb=4"), b"a=ZZb=4");
    }
}
