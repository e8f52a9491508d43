use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "lamina", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a page script (one page or an array of pages) to PNG.
    Render(RenderArgs),
    /// Record a page script into a band log and print the log.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct BandArgs {
    /// Fixed band height in rows; derived from the budget when omitted.
    #[arg(long)]
    band_height: Option<u32>,

    /// Working-memory budget for band buffers, tile cache and command buffer.
    #[arg(long)]
    budget: Option<usize>,
}

impl BandArgs {
    fn band_opts(&self) -> lamina::BandOpts {
        let mut band = lamina::BandOpts {
            band_height: self.band_height,
            ..lamina::BandOpts::default()
        };
        if let Some(budget) = self.budget {
            band.memory_budget = budget;
        }
        band
    }
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input page script JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path; later pages are written next to it as `<stem>-<n>.png`.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = ModeChoice::Banded)]
    mode: ModeChoice,

    #[command(flatten)]
    band: BandArgs,

    /// Upper bound on page log bytes held in memory.
    #[arg(long)]
    max_stream_bytes: Option<usize>,

    /// Play bands on this many threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Print render statistics as JSON.
    #[arg(long)]
    stats: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input page script JSON; only the first page is inspected.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    band: BandArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeChoice {
    Direct,
    Banded,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Document {
    Pages(Vec<lamina::PageScript>),
    Page(lamina::PageScript),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn read_pages(path: &Path) -> anyhow::Result<Vec<lamina::PageScript>> {
    let f = File::open(path).with_context(|| format!("open page script '{}'", path.display()))?;
    let doc: Document = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse page script JSON '{}'", path.display()))?;
    let pages = match doc {
        Document::Pages(pages) => pages,
        Document::Page(page) => vec![page],
    };
    if pages.is_empty() {
        anyhow::bail!("'{}' holds no pages", path.display());
    }
    for (i, page) in pages.iter().enumerate() {
        page.validate().with_context(|| format!("page {i}"))?;
    }
    Ok(pages)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let pages = read_pages(&args.in_path)?;
    let mut band = args.band.band_opts();
    band.max_stream_bytes = args.max_stream_bytes;
    let opts = lamina::RenderOpts {
        mode: match args.mode {
            ModeChoice::Direct => lamina::RenderMode::Direct,
            ModeChoice::Banded => lamina::RenderMode::Banded,
        },
        parallel: args.threads.is_some(),
        threads: args.threads,
        band,
        ..lamina::RenderOpts::default()
    };

    let mut sink = lamina::PngSink::new(lamina::PngSinkOpts::new(&args.out));
    let stats = lamina::render_scripts(&pages, &opts, &mut sink)
        .with_context(|| format!("render '{}'", args.in_path.display()))?;

    if args.stats {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    for path in sink.written() {
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let pages = read_pages(&args.in_path)?;
    let log = lamina::record_page(&pages[0], &args.band.band_opts())
        .with_context(|| format!("record '{}'", args.in_path.display()))?;
    print!("{}", lamina::Inspector::new(&log).listing()?);
    Ok(())
}
