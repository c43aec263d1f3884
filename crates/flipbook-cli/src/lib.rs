use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use flipbook_core::{
    ActiveWindow, Affordances, BookGeometry, ContainerId, DecoderEvent, DocumentSession,
    DocumentSource, DocumentStatus, Flipbook, FlipbookConfig, InstantEngine, LayoutMode,
    Materialization, NavigationIntent, PageDecoder, PlanStatus, Presentation, SessionStats,
    SlotContent, SlotState,
};
use flipbook_pdf::{default_engine, DecoderOptions, PdfEngine, QueuedDecoder};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

const CONTAINER: ContainerId = ContainerId(0);

type PdfFlipbook = Flipbook<QueuedDecoder, InstantEngine>;

#[derive(Debug, Parser)]
#[command(name = "flipbook")]
#[command(about = "Headless PDF flipbook driver")]
pub struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// JSON configuration file. Without it, FLIPBOOK_* environment variables apply.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> Result<FlipbookConfig> {
        match self.config.as_deref() {
            Some(path) => FlipbookConfig::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display())),
            None => FlipbookConfig::from_env().context("invalid FLIPBOOK_* environment"),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Open a document, turn to a page and print the render plan.
    Plan {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1280.0)]
        width: f32,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Run a comma-separated step script and print a plan after every step.
    Replay {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Steps: next, prev, first, last, goto:N, resize:W, scroll:D, retry:N.
        #[arg(long)]
        script: String,
        #[arg(long, default_value_t = 1280.0)]
        width: f32,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Render one page to a PNG.
    RenderPage {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Defaults to the configured maximum page width.
        #[arg(long)]
        width: Option<f32>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    current_page: u32,
    page_count: u32,
    page_label: String,
    window: ActiveWindow,
    layout: LayoutMode,
    presentation: Presentation,
    geometry: BookGeometry,
    affordances: Affordances,
    paint_width: f32,
    slots: Vec<SlotOutput>,
    thumbnails_ready: usize,
    stats: SessionStats,
}

#[derive(Debug, Serialize)]
struct SlotOutput {
    index: u32,
    state: Materialization,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_px: Option<(u32, u32)>,
}

#[derive(Debug, Serialize)]
struct StepOutput<'a> {
    step: &'a str,
    plan: PlanOutput,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Navigate(NavigationIntent),
    Resize(f32),
    Scroll(f32),
    Retry(u32),
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Plan { file, page, width, config } => {
            run_plan(config.load()?, &file, page, width)
        }
        Commands::Replay { file, script, width, config } => {
            run_replay(config.load()?, &file, &script, width)
        }
        Commands::RenderPage { file, page, width, output, config } => {
            let config = config.load()?;
            let width = width.unwrap_or(config.max_page_width);
            run_render_page(&file, page, width, output.as_deref())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    if let Err(error) = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init()
    {
        tracing::debug!(%error, "keeping existing tracing subscriber");
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(DocumentSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let first_page_size_pt = if page_count > 0 {
        let size = engine.page_size(handle, 0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_plan(config: FlipbookConfig, file: &Path, page: u32, width: f32) -> Result<()> {
    let page_index = one_based("--page", page)?;
    let mut flipbook = open_flipbook(config, file, width)?;

    flipbook.navigate(NavigationIntent::GoTo(page_index));

    let json = serde_json::to_string_pretty(&plan_output(&flipbook))?;
    println!("{json}");

    Ok(())
}

fn run_replay(config: FlipbookConfig, file: &Path, script: &str, width: f32) -> Result<()> {
    let steps = script
        .split(',')
        .map(str::trim)
        .filter(|step| !step.is_empty())
        .map(|step| parse_step(step).map(|parsed| (step, parsed)))
        .collect::<Result<Vec<_>>>()?;

    let mut flipbook = open_flipbook(config, file, width)?;

    for (text, step) in steps {
        tracing::info!(step = text, "replaying");
        match step {
            Step::Navigate(intent) => flipbook.navigate(intent),
            Step::Resize(width) => flipbook.resize(CONTAINER, width),
            Step::Scroll(delta_y) => flipbook.scroll(delta_y),
            Step::Retry(page_index) => flipbook.retry(page_index),
        };

        let line = serde_json::to_string(&StepOutput { step: text, plan: plan_output(&flipbook) })?;
        println!("{line}");
    }

    Ok(())
}

fn run_render_page(file: &Path, page: u32, width: f32, output: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;
    let page_index = one_based("--page", page)?;

    let mut decoder = QueuedDecoder::lopdf(DecoderOptions::default());
    decoder.initialize().context("failed to initialize decoder")?;

    let mut session = DocumentSession::new(decoder);
    session.open(DocumentSource::from(file));
    drive(&mut session);

    if let DocumentStatus::Failed(error) = session.status() {
        bail!("failed to open PDF: {error}");
    }

    session.materialize(page_index, width).context("failed to request page")?;
    drive(&mut session);

    let Some(slot) = session.slot(page_index) else {
        bail!("page {page} out of range");
    };

    let image = match slot.state() {
        SlotState::Ready(image) => image,
        SlotState::Failed(error) => bail!("failed to render page {page}: {error}"),
        SlotState::Unrequested | SlotState::Pending(_) => {
            bail!("page {page} did not finish rendering")
        }
    };

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_page_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

/// Feed decoder output back into the session until the decoder goes quiet.
fn drive(session: &mut DocumentSession<QueuedDecoder>) {
    loop {
        let events = session.decoder_mut().poll();
        if events.is_empty() {
            break;
        }

        for event in events {
            match event {
                DecoderEvent::Opened { ticket, result } => {
                    session.finish_open(ticket, result);
                }
                DecoderEvent::PageLoaded { ticket, result } => {
                    session.complete_page(ticket, result);
                }
            }
        }
    }
}

fn open_flipbook(config: FlipbookConfig, file: &Path, width: f32) -> Result<PdfFlipbook> {
    ensure_pdf_exists(file)?;

    let decoder = QueuedDecoder::lopdf(DecoderOptions::default());
    let mut flipbook = Flipbook::new(config, decoder, InstantEngine::new())
        .context("failed to initialize decoder")?;

    flipbook.observe(Some(CONTAINER));
    flipbook.resize(CONTAINER, width);
    flipbook.open(DocumentSource::from(file));
    flipbook.pump();

    if let PlanStatus::Failed(error) = flipbook.render_plan().status {
        bail!("failed to open PDF: {error}");
    }

    Ok(flipbook)
}

fn plan_output(flipbook: &PdfFlipbook) -> PlanOutput {
    let plan = flipbook.render_plan();

    let (status, error) = match plan.status {
        PlanStatus::Empty => ("empty", None),
        PlanStatus::Loading => ("loading", None),
        PlanStatus::Failed(error) => ("failed", Some(error.to_string())),
        PlanStatus::Ready => ("ready", None),
    };

    let slots = plan
        .slots
        .iter()
        .map(|slot| SlotOutput {
            index: slot.index,
            state: slot.content.materialization(),
            size_px: match slot.content {
                SlotContent::Painted { surface, .. } => Some(surface.dimensions()),
                SlotContent::Placeholder { .. } => None,
            },
        })
        .collect();

    PlanOutput {
        status,
        error,
        current_page: plan.current_page,
        page_count: plan.page_count,
        page_label: plan.page_label,
        window: plan.window,
        layout: plan.layout,
        presentation: plan.presentation,
        geometry: plan.geometry,
        affordances: plan.affordances,
        paint_width: flipbook.paint_width(),
        slots,
        thumbnails_ready: plan.thumbnails.iter().filter(|slot| slot.content.is_painted()).count(),
        stats: flipbook.session().stats(),
    }
}

fn parse_step(step: &str) -> Result<Step> {
    let (name, argument) = match step.split_once(':') {
        Some((name, argument)) => (name, Some(argument)),
        None => (step, None),
    };

    let parsed = match (name, argument) {
        ("next", None) => Step::Navigate(NavigationIntent::Next),
        ("prev" | "previous", None) => Step::Navigate(NavigationIntent::Previous),
        ("first", None) => Step::Navigate(NavigationIntent::First),
        ("last", None) => Step::Navigate(NavigationIntent::Last),
        ("goto", Some(page)) => {
            Step::Navigate(NavigationIntent::GoTo(one_based("goto", parse_arg(step, page)?)?))
        }
        ("retry", Some(page)) => Step::Retry(one_based("retry", parse_arg(step, page)?)?),
        ("resize", Some(width)) => Step::Resize(parse_arg(step, width)?),
        ("scroll", Some(delta)) => Step::Scroll(parse_arg(step, delta)?),
        _ => bail!("unknown step `{step}`"),
    };

    Ok(parsed)
}

fn parse_arg<T: std::str::FromStr>(step: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| anyhow::anyhow!("invalid argument in step `{step}`"))
}

fn one_based(name: &str, page: u32) -> Result<u32> {
    match page.checked_sub(1) {
        Some(index) => Ok(index),
        None => bail!("{name} is 1-based and must be >= 1"),
    }
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_page_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
