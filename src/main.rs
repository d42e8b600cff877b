//! CLI entry point for `mhtml2pdf`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use mhtml2pdf::config::{self, Config};
use mhtml2pdf::convert::{discover_archives, Conversion, ConvertOptions, Converter};
use mhtml2pdf::render::chrome::ChromeRenderer;
use mhtml2pdf::render::{RenderRequest, Renderer};

#[derive(Parser)]
#[command(
    name = "mhtml2pdf",
    version,
    about = "Convert saved web pages (MHTML/MHT) to PDF",
    after_help = "With no FILES, every *.mht and *.mhtml file in the current directory is converted."
)]
struct Cli {
    /// MHTML archives to convert
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Keep <name>_files/ and <name>.html after a successful conversion
    #[arg(short, long)]
    keep: bool,

    /// Only write the rewritten HTML; do not render a PDF
    #[arg(long)]
    html_only: bool,

    /// Chrome/Chromium executable used for printing
    #[arg(long, value_name = "PATH", env = "MHTML2PDF_CHROME")]
    chrome: Option<PathBuf>,

    /// Seconds to wait for the browser per page
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    // Command-line flags win over the config file
    if let Some(chrome) = cli.chrome {
        config.render.chrome_path = Some(chrome);
    }
    if let Some(secs) = cli.timeout {
        config.render.timeout_secs = secs;
    }
    let options = ConvertOptions {
        keep_intermediate: cli.keep || config.general.keep_intermediate,
        html_only: cli.html_only,
        render: config.render.clone(),
    };

    let inputs = if cli.files.is_empty() {
        let cwd = std::env::current_dir().context("cannot determine current directory")?;
        discover_archives(&cwd).with_context(|| format!("cannot list {}", cwd.display()))?
    } else {
        cli.files
    };
    if inputs.is_empty() {
        anyhow::bail!("no MHTML files given");
    }

    if options.html_only {
        cmd_convert(&inputs, Converter::new(NoRenderer, options))
    } else {
        let renderer = ChromeRenderer::from_config(&config.render)?;
        cmd_convert(&inputs, Converter::new(renderer, options))
    }
}

fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mhtml2pdf.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Stand-in renderer for `--html-only`, where rendering never happens.
struct NoRenderer;

impl Renderer for NoRenderer {
    fn render(&self, _request: &RenderRequest) -> mhtml2pdf::error::Result<Vec<u8>> {
        Err(mhtml2pdf::error::ConvertError::Render(
            "rendering disabled by --html-only".to_string(),
        ))
    }
}

/// Convert every input in order, stopping at the first failure.
fn cmd_convert<R: Renderer>(inputs: &[PathBuf], converter: Converter<R>) -> anyhow::Result<()> {
    let start = Instant::now();
    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Converting [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let result = converter.convert_all(inputs, &|current, _total, path: &Path| {
        pb.set_position(current as u64);
        pb.set_message(display_name(path));
    });
    pb.finish_and_clear();
    let conversions = result?;

    println!();
    for conversion in &conversions {
        print_conversion(conversion);
    }
    println!(
        "  Converted {} file(s) in {:.1}s",
        conversions.len(),
        start.elapsed().as_secs_f64()
    );
    println!();
    Ok(())
}

fn print_conversion(conversion: &Conversion) {
    use humansize::{format_size, BINARY};

    println!("  {}", conversion.input.display());
    println!("    {:<20} {}", "Parts", conversion.parts);
    println!("    {:<20} {}", "Resources saved", conversion.resources);
    println!("    {:<20} {}", "References rewritten", conversion.rewritten);
    match conversion.pdf_size {
        Some(size) => println!(
            "    {:<20} {} ({})",
            "Output",
            conversion.paths.pdf.display(),
            format_size(size, BINARY)
        ),
        None => println!("    {:<20} {}", "Output", conversion.paths.html.display()),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
