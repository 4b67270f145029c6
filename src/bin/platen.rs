use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use platen::assets::text::FontCatalog;
use platen::doc::model::Document;
use platen::doc::settings::{OutputFormat, PageRange, RenderSettings};
use platen::encode::sink_for;
use platen::media::{MediaRecord, MediaStore};
use platen::render::compositor::PageCompositor;
use platen::render::page::{PageStep, RenderOutcome, render_document};
use platen::transform::ops::{TransformKind, apply_transform};

#[derive(Parser, Debug)]
#[command(name = "platen", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a document bundle to PDF, PNG, or JPEG.
    Render(RenderArgs),
    /// Apply one image transformation and write the PNG result.
    Transform(TransformArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input bundle JSON (document plus media-id-to-file map).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output file path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = FormatChoice::Pdf)]
    format: FormatChoice,

    #[arg(long, default_value_t = 300.0)]
    dpi: f64,

    /// JPEG quality, 1-100.
    #[arg(long, default_value_t = 95)]
    quality: u8,

    /// Page selection as `start-end` (1-based, inclusive). Defaults to all.
    #[arg(long)]
    pages: Option<String>,

    /// Add a 3 mm bleed margin around each page.
    #[arg(long)]
    bleed: bool,

    /// Stroke crop marks in the bleed margin (PDF only, implies --bleed).
    #[arg(long)]
    crop_marks: bool,

    /// Clamp element boxes to the page instead of letting them overflow.
    #[arg(long)]
    clip: bool,

    /// Extra font file to register; repeatable. The first becomes the
    /// default family.
    #[arg(long)]
    font: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
struct TransformArgs {
    /// Input image file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, value_enum)]
    op: OpChoice,

    /// Scale factor for --op upscale.
    #[arg(long, default_value_t = 2.0)]
    scale: f64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Pdf,
    Png,
    Jpeg,
}

impl From<FormatChoice> for OutputFormat {
    fn from(choice: FormatChoice) -> Self {
        match choice {
            FormatChoice::Pdf => OutputFormat::Pdf,
            FormatChoice::Png => OutputFormat::Png,
            FormatChoice::Jpeg => OutputFormat::Jpeg,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OpChoice {
    Upscale,
    BackgroundRemoval,
    NoiseReduction,
    ColorCorrection,
    Sharpen,
    StyleTransfer,
}

/// On-disk input for `render`: the document and where its media ids live,
/// relative to the bundle file.
#[derive(Debug, serde::Deserialize)]
struct Bundle {
    document: Document,
    #[serde(default)]
    media: HashMap<Uuid, PathBuf>,
}

/// Serves the bundle's media map straight from disk.
struct BundleMedia {
    root: PathBuf,
    files: HashMap<Uuid, PathBuf>,
}

impl MediaStore for BundleMedia {
    fn get_media(&self, id: Uuid, owner: &str) -> platen::PlatenResult<MediaRecord> {
        let path = self
            .files
            .get(&id)
            .ok_or_else(|| platen::PlatenError::not_found(format!("media {id}")))?;
        let resolved = self.root.join(path);
        let size_bytes = std::fs::metadata(&resolved).map(|m| m.len()).unwrap_or(0);
        Ok(MediaRecord {
            id,
            owner: owner.to_string(),
            name: path.display().to_string(),
            path: resolved,
            mime_type: "application/octet-stream".to_string(),
            size_bytes,
            dimensions: None,
            created_at: chrono::Utc::now(),
        })
    }

    fn read_media(&self, id: Uuid, owner: &str) -> platen::PlatenResult<Vec<u8>> {
        let record = self.get_media(id, owner)?;
        std::fs::read(&record.path).map_err(|e| {
            platen::PlatenError::transient_io(format!("read '{}': {e}", record.path.display()))
        })
    }

    fn register_artifact(
        &self,
        _bytes: &[u8],
        _name: &str,
        _mime_type: &str,
        _owner: &str,
    ) -> platen::PlatenResult<MediaRecord> {
        Err(platen::PlatenError::invalid_state(
            "bundle media is read-only",
        ))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Transform(args) => cmd_transform(args),
    }
}

fn read_bundle(path: &Path) -> anyhow::Result<Bundle> {
    let f = File::open(path).with_context(|| format!("open bundle '{}'", path.display()))?;
    let bundle: Bundle =
        serde_json::from_reader(BufReader::new(f)).context("parse bundle JSON")?;
    Ok(bundle)
}

fn parse_pages(spec: &str) -> anyhow::Result<PageRange> {
    let (start, end) = spec
        .split_once('-')
        .with_context(|| format!("page range '{spec}' is not 'start-end'"))?;
    Ok(PageRange::Pages {
        start: start.trim().parse().context("page range start")?,
        end: end.trim().parse().context("page range end")?,
    })
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let bundle = read_bundle(&args.in_path)?;
    bundle.document.validate()?;

    let mut settings = RenderSettings::new(args.format.into());
    settings.dpi = platen::foundation::core::Dpi::new(args.dpi)?;
    settings.quality = args.quality;
    settings.bleed = args.bleed || args.crop_marks;
    settings.crop_marks = args.crop_marks;
    settings.clip_elements = args.clip;
    if let Some(spec) = &args.pages {
        settings.page_range = parse_pages(spec)?;
    }
    settings.validate()?;

    let mut fonts = FontCatalog::new();
    for font_path in &args.font {
        let bytes = std::fs::read(font_path)
            .with_context(|| format!("read font '{}'", font_path.display()))?;
        let family = font_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".to_string());
        fonts.register(&family, bytes);
    }
    if fonts.is_empty() {
        fonts = FontCatalog::with_system_defaults();
    }

    let root = args
        .in_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let media = std::sync::Arc::new(BundleMedia {
        root,
        files: bundle.media,
    });

    let mut compositor = PageCompositor::new(media, fonts);
    let mut sink = sink_for(settings.format)?;
    let outcome = render_document(
        &mut compositor,
        &bundle.document,
        "cli",
        &settings,
        sink.as_mut(),
        &mut |_, _| PageStep::Continue,
    )?;
    let RenderOutcome::Completed(bytes) = outcome else {
        anyhow::bail!("render stopped unexpectedly");
    };

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &bytes)
        .with_context(|| format!("write '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_transform(args: TransformArgs) -> anyhow::Result<()> {
    let source = std::fs::read(&args.in_path)
        .with_context(|| format!("read '{}'", args.in_path.display()))?;
    let kind = match args.op {
        OpChoice::Upscale => TransformKind::Upscale { scale: args.scale },
        OpChoice::BackgroundRemoval => TransformKind::BackgroundRemoval,
        OpChoice::NoiseReduction => TransformKind::NoiseReduction,
        OpChoice::ColorCorrection => TransformKind::ColorCorrection,
        OpChoice::Sharpen => TransformKind::Sharpen,
        OpChoice::StyleTransfer => TransformKind::StyleTransfer,
    };

    let output = apply_transform(&source, &kind)?;
    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &output.png)
        .with_context(|| format!("write '{}'", args.out.display()))?;
    eprintln!(
        "wrote {} ({}x{}, quality score {})",
        args.out.display(),
        output.width,
        output.height,
        output.quality_score
    );
    Ok(())
}
