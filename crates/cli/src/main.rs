//! CLI tool for converting slide decks to Markdown or TiddlyWiki markup.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use deck2md_core::config::{DEFAULT_MIN_NOTES_PROSE_RATIO, DEFAULT_TEXT_BLOCK_THRESHOLD};
use deck2md_core::{
    ConversionConfig, ConversionSummary, CustomTitles, PageSelection, Presentation,
    PresentationFormat, RendererKind,
};
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Convert a PowerPoint deck into structured Markdown.
#[derive(Parser, Debug)]
#[command(name = "deck2md")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input presentation (.pptx)
    input: PathBuf,

    /// Output file (default: input name with .md, or .tid for wiki, next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for extracted pictures (default: img next to the output)
    #[arg(short = 'i', long)]
    image_dir: Option<PathBuf>,

    /// Maximum display width of pictures, in pixels
    #[arg(long)]
    image_width: Option<u32>,

    /// Output dialect
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,

    /// File of canonical section titles, indented to show their level
    #[arg(short = 't', long = "title")]
    titles: Option<PathBuf>,

    /// Minimum number of characters for a text shape to be kept
    #[arg(long, default_value_t = DEFAULT_TEXT_BLOCK_THRESHOLD)]
    min_block_size: usize,

    /// Convert only this slide (1-based)
    #[arg(long)]
    page: Option<NonZeroUsize>,

    /// Minimum share of non-link text for speaker notes to be kept
    #[arg(long, default_value_t = DEFAULT_MIN_NOTES_PROSE_RATIO)]
    min_prose_ratio: f64,

    /// Do not extract pictures
    #[arg(long)]
    disable_image: bool,

    /// Do not emit text colors
    #[arg(long)]
    disable_color: bool,

    /// Do not escape markup characters in slide text
    #[arg(long)]
    disable_escaping: bool,

    /// Do not emit speaker notes
    #[arg(long)]
    disable_notes: bool,

    /// Keep line breaks inside titles
    #[arg(long)]
    keep_title_newlines: bool,

    /// Print the parsed document model as JSON and exit
    #[arg(long)]
    dump_json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Standard Markdown
    Markdown,
    /// TiddlyWiki markup
    Wiki,
    /// Markdown for HeySam
    Heysam,
}

impl From<OutputFormat> for RendererKind {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Markdown => RendererKind::Markdown,
            OutputFormat::Wiki => RendererKind::Wiki,
            OutputFormat::Heysam => RendererKind::HeySam,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    if args.verbose {
        eprintln!("Processing: {}", args.input.display());
    }

    let presentation = load_presentation(&args.input)?;

    if args.verbose {
        eprintln!("  Found {} slides", presentation.slides.len());
    }

    if args.dump_json {
        let json = serde_json::to_string_pretty(&presentation)
            .context("Failed to serialize document model")?;
        println!("{}", json);
        return Ok(());
    }

    let kind = RendererKind::from(args.format);
    let output_path = get_output_path(&args.input, args.output.as_deref(), kind);
    let config = build_config(&args, &output_path)?;

    let summary = write_output(&presentation, &config, kind, &output_path)?;

    if args.verbose {
        eprintln!(
            "  Converted {} slides, {} pictures",
            summary.slides_processed, summary.pictures
        );
        eprintln!("Written to: {}", output_path.display());
    }

    if !summary.notices.is_empty() {
        eprintln!("Process finished with notice:");
        for notice in &summary.notices {
            eprintln!("{}", notice);
        }
    }

    Ok(())
}

/// Read a presentation file and parse it into the document model.
fn load_presentation(input_path: &Path) -> Result<Presentation> {
    let bytes = std::fs::read(input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;

    let ext = input_path.extension().and_then(|e| e.to_str());
    let format = PresentationFormat::detect(&bytes, ext)
        .with_context(|| format!("Cannot read {}", input_path.display()))?;
    format
        .ensure_supported()
        .with_context(|| format!("Cannot read {}", input_path.display()))?;

    let filename = input_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    log::debug!("Parsing {} as {:?}", filename, format);
    deck2md_pptx::PptxParser::new()
        .parse(Cursor::new(bytes), filename)
        .with_context(|| format!("Failed to parse {}", input_path.display()))
}

/// Translate command-line options into a conversion config.
fn build_config(args: &Args, output_path: &Path) -> Result<ConversionConfig> {
    let image_dir = args.image_dir.clone().unwrap_or_else(|| {
        output_path
            .parent()
            .map(|p| p.join("img"))
            .unwrap_or_else(|| PathBuf::from("img"))
    });
    let prefix = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("img")
        .to_string();
    let page = match args.page {
        Some(page) => PageSelection::Single(page),
        None => PageSelection::All,
    };

    let mut config = ConversionConfig::new()
        .with_output_path(output_path)
        .with_image_dir(image_dir)
        .with_image_prefix(prefix)
        .with_max_image_width(args.image_width)
        .with_images(!args.disable_image)
        .with_color(!args.disable_color)
        .with_escaping(!args.disable_escaping)
        .with_notes(!args.disable_notes)
        .with_title_newline_removal(!args.keep_title_newlines)
        .with_text_block_threshold(args.min_block_size)
        .with_min_notes_prose_ratio(args.min_prose_ratio)
        .with_page(page);

    if let Some(ref path) = args.titles {
        let titles = CustomTitles::from_file(path)
            .with_context(|| format!("Failed to read title file {}", path.display()))?;
        config = config.with_custom_titles(titles);
    }

    config.validate()?;
    Ok(config)
}

/// Determine the output path for a processed file.
fn get_output_path(input_path: &Path, output: Option<&Path>, kind: RendererKind) -> PathBuf {
    if let Some(path) = output {
        return path.to_path_buf();
    }

    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let output_filename = format!("{}.{}", stem, kind.extension());

    match input_path.parent() {
        Some(parent) => parent.join(output_filename),
        None => PathBuf::from(output_filename),
    }
}

/// Render the presentation into the output file.
fn write_output(
    presentation: &Presentation,
    config: &ConversionConfig,
    kind: RendererKind,
    path: &Path,
) -> Result<ConversionSummary> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    let mut renderer = kind.build(BufWriter::new(file));
    deck2md_core::convert(presentation, config, renderer.as_mut())
        .with_context(|| format!("Failed to write to {}", path.display()))
}
