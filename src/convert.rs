//! The conversion pipeline for one archive, and for a batch of them.
//!
//! decode → find HTML → persist resources → rewrite references → write
//! `<name>.html` → render → write `<name>.pdf` → clean up.
//! Any failure stops the file (and the batch); intermediate files of a failed
//! conversion are left in place for inspection.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::RenderConfig;
use crate::error::{ConvertError, Result};
use crate::export::resources::{find_html, persist_resources};
use crate::export::rewrite::HtmlDocument;
use crate::parser::archive::decode_file;
use crate::render::{RenderRequest, Renderer};

/// File extensions recognized as MHTML archives.
pub const ARCHIVE_EXTENSIONS: [&str; 2] = ["mht", "mhtml"];

/// Where a conversion writes its files, all next to the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// `<name>_files/`: persisted resources.
    pub files_dir: PathBuf,
    /// `<name>.html`: the rewritten document.
    pub html: PathBuf,
    /// `<name>.pdf`: the rendered result.
    pub pdf: PathBuf,
}

impl OutputPaths {
    pub fn for_input(input: &Path) -> Self {
        let base = input.with_extension("");
        let with_suffix = |suffix: &str| {
            let mut name: OsString = base.clone().into_os_string();
            name.push(suffix);
            PathBuf::from(name)
        };
        Self {
            files_dir: with_suffix("_files"),
            html: with_suffix(".html"),
            pdf: with_suffix(".pdf"),
        }
    }
}

/// Knobs for [`Converter`].
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Leave `<name>_files/` and `<name>.html` behind after success.
    pub keep_intermediate: bool,
    /// Stop after writing the rewritten HTML; do not render.
    pub html_only: bool,
    /// Options passed to the renderer.
    pub render: RenderConfig,
}

/// What one successful conversion produced.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub input: PathBuf,
    pub paths: OutputPaths,
    /// Number of parts decoded from the archive.
    pub parts: usize,
    /// Number of resource files written.
    pub resources: usize,
    /// Number of references pointed at local files.
    pub rewritten: usize,
    /// Size of the PDF, if one was rendered.
    pub pdf_size: Option<u64>,
}

/// Runs the pipeline with a given renderer.
pub struct Converter<R> {
    renderer: R,
    options: ConvertOptions,
}

impl<R: Renderer> Converter<R> {
    pub fn new(renderer: R, options: ConvertOptions) -> Self {
        Self { renderer, options }
    }

    /// Convert a single archive. Errors name the input file.
    pub fn convert(&self, input: &Path) -> Result<Conversion> {
        self.convert_file(input).map_err(|e| e.in_file(input))
    }

    /// Convert archives one after another, stopping at the first failure.
    ///
    /// `progress` is called with `(index, total, path)` before each file.
    pub fn convert_all(
        &self,
        inputs: &[PathBuf],
        progress: &dyn Fn(usize, usize, &Path),
    ) -> Result<Vec<Conversion>> {
        let total = inputs.len();
        let mut done = Vec::with_capacity(total);
        for (i, input) in inputs.iter().enumerate() {
            progress(i, total, input);
            done.push(self.convert(input)?);
        }
        Ok(done)
    }

    fn convert_file(&self, input: &Path) -> Result<Conversion> {
        info!(path = %input.display(), "Processing");
        let paths = OutputPaths::for_input(input);
        let document_dir = input.parent().unwrap_or(Path::new(""));

        let parts = decode_file(input)?;
        let html_index = find_html(&parts)?;
        debug!(parts = parts.len(), html_index, "Selected HTML document");

        let persisted = persist_resources(&parts, html_index, &paths.files_dir)?;

        let mut document = HtmlDocument::from_part(&parts[html_index])?;
        let stats = document.rewrite_references(&persisted.locations, document_dir);
        write_document(&document, &paths.html)?;

        let mut conversion = Conversion {
            input: input.to_path_buf(),
            paths,
            parts: parts.len(),
            resources: persisted.files.len(),
            rewritten: stats.rewritten,
            pdf_size: None,
        };
        if self.options.html_only {
            info!(html = %conversion.paths.html.display(), "Wrote HTML");
            return Ok(conversion);
        }

        let request = RenderRequest::for_file(&conversion.paths.html, &self.options.render)?;
        let pdf = self.renderer.render(&request)?;
        std::fs::write(&conversion.paths.pdf, &pdf)
            .map_err(|e| ConvertError::persistence(&conversion.paths.pdf, e))?;
        conversion.pdf_size = Some(pdf.len() as u64);
        info!(pdf = %conversion.paths.pdf.display(), bytes = pdf.len(), "Wrote PDF");

        if !self.options.keep_intermediate {
            remove_intermediates(&conversion.paths)?;
        }
        Ok(conversion)
    }
}

fn write_document(document: &HtmlDocument, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| ConvertError::persistence(path, e))?;
    let mut writer = BufWriter::new(file);
    document
        .write_to(&mut writer)
        .and_then(|()| writer.flush())
        .map_err(|e| ConvertError::persistence(path, e))
}

fn remove_intermediates(paths: &OutputPaths) -> Result<()> {
    if paths.files_dir.exists() {
        std::fs::remove_dir_all(&paths.files_dir)
            .map_err(|e| ConvertError::persistence(&paths.files_dir, e))?;
    }
    std::fs::remove_file(&paths.html).map_err(|e| ConvertError::persistence(&paths.html, e))?;
    debug!(dir = %paths.files_dir.display(), "Removed intermediate files");
    Ok(())
}

/// MHTML archives directly inside `dir`, sorted by path.
pub fn discover_archives(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_archive = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| ARCHIVE_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)));
        if is_archive && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
