//! The boundary to the external page renderer.
//!
//! Rendering HTML to PDF is delegated to a browser. The conversion pipeline
//! only needs something that takes a `file://` URL and hands back PDF bytes.

pub mod chrome;

use std::path::Path;
use std::time::Duration;

use crate::config::RenderConfig;
use crate::error::{ConvertError, Result};

/// One page-print request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// `file://` URL of the rewritten HTML document.
    pub url: String,
    /// CSS selector that must be visible before the page is printed.
    pub wait_selector: String,
    /// User-agent string presented to the page.
    pub user_agent: String,
    /// Include background colors and images in the print.
    pub print_background: bool,
    /// Give up after this long.
    pub timeout: Duration,
}

impl RenderRequest {
    /// Build a request for a local HTML file using the configured options.
    pub fn for_file(html: &Path, config: &RenderConfig) -> Result<Self> {
        Ok(Self {
            url: file_url(html)?,
            wait_selector: config.wait_selector.clone(),
            user_agent: config.user_agent.clone(),
            print_background: config.print_background,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

/// Something that can print a page to PDF.
pub trait Renderer {
    /// Render the page at `request.url` and return the PDF bytes.
    ///
    /// Blocks until the PDF is ready, the renderer fails, or the timeout
    /// expires.
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>>;
}

impl<T: Renderer + ?Sized> Renderer for &T {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>> {
        (**self).render(request)
    }
}

/// `file://` URL for a local path (made absolute first).
pub fn file_url(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)
        .map_err(|e| ConvertError::Render(format!("cannot resolve {}: {e}", path.display())))?;
    let text = absolute.to_string_lossy().replace('\\', "/");
    let mut url = String::from("file://");
    if !text.starts_with('/') {
        // Windows drive paths: file:///C:/...
        url.push('/');
    }
    for ch in text.chars() {
        match ch {
            ' ' => url.push_str("%20"),
            '#' => url.push_str("%23"),
            '?' => url.push_str("%3F"),
            '%' => url.push_str("%25"),
            c => url.push(c),
        }
    }
    Ok(url)
}
