//! Write embedded resources to disk and remember where each one went.
//!
//! Files are laid out as `{files_dir}/{type}/{subtype}/{index}{ext}`, where
//! `index` is the part's position in decode order.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConvertError, Result};
use crate::model::part::{LocationMap, RawPart};

/// Result of [`persist_resources`].
#[derive(Debug, Default)]
pub struct PersistedResources {
    /// `Content-Location` → written file, for parts that declared one.
    pub locations: LocationMap,
    /// Every file written, in decode order.
    pub files: Vec<PathBuf>,
}

/// Index of the primary HTML document: the first `text/html` part.
///
/// Every part is checked for a usable `Content-Type` on the way, so a
/// malformed archive is rejected before anything is written.
pub fn find_html(parts: &[RawPart]) -> Result<usize> {
    let mut html = None;
    for (index, part) in parts.iter().enumerate() {
        let mime = part.require_content_type(index)?;
        if html.is_none() && mime.is_html() {
            html = Some(index);
        }
    }
    html.ok_or(ConvertError::HtmlNotFound)
}

/// Persist every part except `html_index` under `files_dir`.
pub fn persist_resources(
    parts: &[RawPart],
    html_index: usize,
    files_dir: &Path,
) -> Result<PersistedResources> {
    let mut persisted = PersistedResources::default();

    for (index, part) in parts.iter().enumerate() {
        if index == html_index {
            continue;
        }
        let mime = part.require_content_type(index)?;

        let dir = mime
            .essence()
            .split('/')
            .fold(files_dir.to_path_buf(), |dir, segment| {
                dir.join(safe_segment(segment))
            });
        std::fs::create_dir_all(&dir).map_err(|e| ConvertError::persistence(&dir, e))?;

        let file = dir.join(format!("{index}{}", extension_for(mime.essence())));
        std::fs::write(&file, &part.body).map_err(|e| ConvertError::persistence(&file, e))?;
        debug!(
            index,
            mime = mime.essence(),
            size = part.body.len(),
            path = %file.display(),
            "Wrote resource"
        );

        if let Some(location) = part.location() {
            persisted.locations.insert(location.to_string(), file.clone());
        }
        persisted.files.push(file);
    }

    info!(
        files = persisted.files.len(),
        referenced = persisted.locations.len(),
        dir = %files_dir.display(),
        "Persisted resources"
    );
    Ok(persisted)
}

/// File extension (with the dot) for a lowercased media type.
///
/// JPEG is pinned to `.jpg` because registries disagree on its first
/// extension (`.jfif`, `.jpe`, ...). Unknown types get `.dat`.
pub fn extension_for(mime: &str) -> String {
    if mime == "image/jpeg" {
        return ".jpg".to_string();
    }
    mime_guess::get_mime_extensions_str(mime)
        .and_then(|exts| exts.first())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".dat".to_string())
}

/// Keep a media-type segment from escaping the resource directory.
fn safe_segment(segment: &str) -> &str {
    match segment {
        "" | "." | ".." => "_",
        s => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::part::HeaderMap;

    fn part(content_type: Option<&str>, location: Option<&str>, body: &[u8]) -> RawPart {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.append("Content-Type", ct);
        }
        if let Some(loc) = location {
            headers.append("Content-Location", loc);
        }
        RawPart {
            headers,
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg"), ".jpg");
        assert_eq!(extension_for("image/png"), ".png");
        assert_eq!(extension_for("text/css"), ".css");
        assert_eq!(extension_for("application/x-no-such-thing"), ".dat");
    }

    #[test]
    fn test_find_html_takes_first() {
        let parts = vec![
            part(Some("text/css"), None, b""),
            part(Some("text/html"), None, b"a"),
            part(Some("text/html"), None, b"b"),
        ];
        assert_eq!(find_html(&parts).unwrap(), 1);
    }

    #[test]
    fn test_find_html_missing() {
        let parts = vec![part(Some("image/png"), None, b"")];
        assert!(matches!(find_html(&parts), Err(ConvertError::HtmlNotFound)));
    }

    #[test]
    fn test_find_html_rejects_untyped_part() {
        let parts = vec![
            part(Some("text/html"), None, b""),
            part(None, Some("cid:x"), b""),
        ];
        assert!(matches!(
            find_html(&parts),
            Err(ConvertError::MissingContentType { index: Some(1) })
        ));
    }

    #[test]
    fn test_persist_layout_and_map() {
        let tmp = tempfile::tempdir().unwrap();
        let files_dir = tmp.path().join("page_files");
        let parts = vec![
            part(Some("text/html"), Some("https://example.com/"), b"<html>"),
            part(Some("image/png"), Some("cid:image1"), b"PNG"),
            part(Some("text/css"), None, b"body{}"),
            part(Some("image/jpeg"), Some("https://example.com/a.jpg"), b"JPG"),
        ];

        let persisted = persist_resources(&parts, 0, &files_dir).unwrap();

        assert_eq!(persisted.files.len(), 3);
        assert_eq!(persisted.locations.len(), 2);

        let png = files_dir.join("image").join("png").join("1.png");
        assert_eq!(persisted.locations["cid:image1"], png);
        assert_eq!(std::fs::read(&png).unwrap(), b"PNG");

        let css = files_dir.join("text").join("css").join("2.css");
        assert!(css.exists());

        let jpg = files_dir.join("image").join("jpeg").join("3.jpg");
        assert_eq!(persisted.locations["https://example.com/a.jpg"], jpg);

        // The HTML document itself is not written as a resource.
        assert!(!files_dir.join("text").join("html").exists());
    }

    #[test]
    fn test_later_html_parts_are_resources() {
        let tmp = tempfile::tempdir().unwrap();
        let parts = vec![
            part(Some("text/html"), None, b"main"),
            part(Some("text/html"), Some("https://example.com/frame"), b"frame"),
        ];
        let persisted = persist_resources(&parts, 0, tmp.path()).unwrap();
        assert_eq!(persisted.files.len(), 1);
        assert!(persisted.locations.contains_key("https://example.com/frame"));
    }

    #[test]
    fn test_traversal_segments_are_neutralized() {
        let tmp = tempfile::tempdir().unwrap();
        let files_dir = tmp.path().join("x_files");
        let parts = vec![
            part(Some("text/html"), None, b""),
            part(Some("../.."), None, b"evil"),
        ];
        let persisted = persist_resources(&parts, 0, &files_dir).unwrap();
        assert!(persisted.files[0].starts_with(&files_dir));
    }

    #[test]
    fn test_write_failure_is_persistence_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocked");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let parts = vec![
            part(Some("text/html"), None, b""),
            part(Some("image/png"), None, b"PNG"),
        ];
        assert!(matches!(
            persist_resources(&parts, 0, &blocker),
            Err(ConvertError::Persistence { .. })
        ));
    }
}
