//! Integration tests for archive decoding: stream adapters, headers,
//! multipart splitting and transfer decoding on real-looking archives.

use std::io::{Cursor, Read};
use std::path::Path;

use mhtml2pdf::error::ConvertError;
use mhtml2pdf::export::resources::find_html;
use mhtml2pdf::parser::archive::{decode_archive, decode_file};
use mhtml2pdf::parser::header::read_header_block;
use mhtml2pdf::parser::stream::{StripPreamble, TrimLeading, MIME_PREAMBLE};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

// ─── Test 1: Blink archive → four flat parts in order ───────────────

#[test]
fn test_decode_blink_archive() {
    let parts = decode_file(&fixture("simple.mht")).unwrap();
    let types: Vec<_> = parts
        .iter()
        .map(|p| p.headers.get("content-type").unwrap_or_default().to_string())
        .collect();
    assert_eq!(types, ["text/html", "image/png", "text/css", "image/jpeg"]);
    assert_eq!(parts[1].location(), Some("cid:image1"));
    assert_eq!(parts[3].body, b"\xff\xd8\xff\xe0\x00\x10JFIF");
}

// ─── Test 2: transfer encodings are undone ──────────────────────────

#[test]
fn test_quoted_printable_html_is_decoded() {
    let parts = decode_file(&fixture("simple.mht")).unwrap();
    let html = String::from_utf8(parts[0].body.clone()).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"), "{html}");
    assert!(html.contains("<h1>Café</h1>"), "{html}");
    assert!(html.contains("<body>"), "{html}");
    assert!(parts
        .iter()
        .all(|p| p.headers.get("content-transfer-encoding").is_none()));
}

// ─── Test 3: leading blank lines do not change the result ───────────

#[test]
fn test_leading_blank_lines_are_ignored() {
    let plain = decode_file(&fixture("simple.mht")).unwrap();
    let padded = decode_file(&fixture("leading_blank.mht")).unwrap();
    assert_eq!(plain.len(), padded.len());
    for (a, b) in plain.iter().zip(&padded) {
        assert_eq!(a.headers, b.headers);
        assert_eq!(a.body, b.body);
    }
}

// ─── Test 4: Internet Explorer style preamble ───────────────────────

#[test]
fn test_legacy_archive_with_preamble() {
    let parts = decode_file(&fixture("legacy_ie.mht")).unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(find_html(&parts).unwrap(), 0);
    assert_eq!(parts[1].body, b"\x89PNG\r\n\x1a\n");
    // windows-1252 bytes survive transfer decoding untouched
    assert!(parts[0].body.windows(2).any(|w| w == b"\x93q"));
}

// ─── Test 5: nested multipart flattens ──────────────────────────────

#[test]
fn test_nested_multipart_flattens() {
    let parts = decode_file(&fixture("nested.mhtml")).unwrap();
    assert_eq!(parts.len(), 3);
    for part in &parts {
        let ct = part.headers.content_type().unwrap().unwrap();
        assert!(!ct.is_multipart(), "container left behind: {}", ct.essence());
    }
    assert_eq!(parts[1].location(), Some("https://example.com/a.png"));
    assert_eq!(parts[2].location(), Some("https://example.com/b.gif"));
    assert!(parts[2].body.starts_with(b"GIF89a"));
}

// ─── Test 6: missing content type is reported with its index ────────

#[test]
fn test_missing_content_type_reported() {
    let parts = decode_file(&fixture("missing_content_type.mht")).unwrap();
    let err = find_html(&parts).unwrap_err();
    assert!(matches!(err, ConvertError::MissingContentType { index: Some(1) }));
}

#[test]
fn test_archive_without_html() {
    let parts = decode_file(&fixture("no_html.mht")).unwrap();
    assert_eq!(parts.len(), 2);
    assert!(matches!(find_html(&parts), Err(ConvertError::HtmlNotFound)));
}

// ─── Test 7: stream adapters compose over a byte stream ─────────────

#[test]
fn test_adapters_over_fixture_bytes() {
    let raw = std::fs::read(fixture("legacy_ie.mht")).unwrap();
    let mut cleaned = Vec::new();
    TrimLeading::new(StripPreamble::new(Cursor::new(raw)))
        .read_to_end(&mut cleaned)
        .unwrap();
    let text = String::from_utf8_lossy(&cleaned);
    assert!(text.starts_with("From: "));
    assert!(!text.contains(MIME_PREAMBLE));
}

#[test]
fn test_header_block_leaves_reader_at_body() {
    let raw = std::fs::read(fixture("nested.mhtml")).unwrap();
    let mut reader = Cursor::new(raw);
    let headers = read_header_block(&mut reader).unwrap();
    assert_eq!(headers.get("mime-version"), Some("1.0"));
    let ct = headers.content_type().unwrap().unwrap();
    assert_eq!(ct.param("boundary"), Some("outer"));

    let mut rest = String::new();
    reader.read_to_string(&mut rest).unwrap();
    assert!(rest.starts_with("--outer\n"), "{rest}");
}

#[test]
fn test_garbage_is_rejected() {
    let err = decode_archive(&b"not an archive at all\n"[..]).unwrap_err();
    assert!(matches!(err, ConvertError::HeaderParse { .. }), "{err}");
}
