mod formatters;

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

use adx_query::{parse_filter, Decoder, QueryEngine};
use formatters::OutputFormat;

/// Offline query engine for ADExplorer directory snapshot files.
#[derive(Parser, Debug)]
#[command(author, version, about = "Query ADExplorer snapshot (.dat) files offline")]
struct Cli {
    /// Snapshot file to open
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// LDAP-style filter, e.g. "(&(objectClass=user)(cn=al*))"
    #[arg(long)]
    filter: Option<String>,

    /// Attributes to project, in order (repeatable, or comma-separated)
    #[arg(long, value_delimiter = ',')]
    attributes: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = CliFormat::Table)]
    format: CliFormat,

    /// Stop after this many matches
    #[arg(long)]
    limit: Option<usize>,

    /// Reserved for case-insensitive matching; comparisons are already
    /// case-folded regardless of this flag.
    #[arg(long)]
    ignore_case: bool,

    /// Print query stats (entries evaluated, matches, duration) after running
    #[arg(long)]
    benchmark: bool,

    /// Print the snapshot header before running the query
    #[arg(long)]
    dump_header: bool,

    /// Write results here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Drop into a line-oriented REPL: one filter per line, until EOF or ":quit"
    #[arg(long)]
    interactive: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliFormat {
    Table,
    Csv,
    Json,
    Ndjson,
}

impl From<CliFormat> for OutputFormat {
    fn from(value: CliFormat) -> Self {
        match value {
            CliFormat::Table => OutputFormat::Table,
            CliFormat::Csv => OutputFormat::Csv,
            CliFormat::Json => OutputFormat::Json,
            CliFormat::Ndjson => OutputFormat::Ndjson,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let snapshot_path = cli.snapshot.as_ref().context("--snapshot is required")?;

    debug!("opening snapshot: {}", snapshot_path.display());
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.set_message(format!("opening {}", snapshot_path.display()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    let decoder = Decoder::open(snapshot_path)?;
    spinner.finish_and_clear();
    info!(
        "snapshot opened: {} objects, {} attributes, captured {}",
        decoder.header().num_objects,
        decoder.header().num_attributes,
        decoder.header().captured_at
    );

    let mut sink: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    if cli.dump_header {
        dump_header(&decoder, sink.as_mut())?;
    }

    if cli.interactive {
        return run_interactive(&decoder, &cli, sink.as_mut());
    }

    let filter_text = cli
        .filter
        .as_ref()
        .context("--filter is required (unless running --interactive)")?;

    run_query(&decoder, filter_text, &cli, sink.as_mut())?;
    Ok(())
}

fn dump_header(decoder: &Decoder, out: &mut dyn Write) -> Result<()> {
    let header = decoder.header();
    writeln!(out, "signature:       {}", header.signature)?;
    writeln!(out, "captured_at:     {}", header.captured_at)?;
    writeln!(out, "description:     {}", header.description)?;
    writeln!(out, "server:          {}", header.server)?;
    writeln!(out, "num_objects:     {}", header.num_objects)?;
    writeln!(out, "num_attributes:  {}", header.num_attributes)?;
    writeln!(out, "file_size:       {}", header.file_size)?;
    writeln!(out)?;
    Ok(())
}

fn run_query(decoder: &Decoder, filter_text: &str, cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let tree = parse_filter(filter_text).context("invalid filter")?;
    let attributes = if cli.attributes.is_empty() { None } else { Some(cli.attributes.as_slice()) };
    let engine = QueryEngine::new(decoder, tree, cli.ignore_case, attributes, cli.limit);

    for unknown in engine.unknown_attributes() {
        log::warn!("requested attribute '{unknown}' is not present in this snapshot's schema");
    }

    let entries = engine.search();
    let records: Vec<formatters::Record> = entries.iter().map(|entry| engine.materialise(entry)).collect();

    formatters::write_records(cli.format.into(), &records, out)?;

    if cli.benchmark {
        let stats = engine.stats();
        writeln!(
            out,
            "entries_evaluated={} matches={} duration_seconds={:.6}",
            stats.entries_evaluated, stats.matches, stats.duration_seconds
        )?;
    }

    Ok(())
}

fn run_interactive(decoder: &Decoder, cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let stdin = io::stdin();
    writeln!(out, "adx-query interactive mode. One filter per line, \":quit\" to exit.")?;
    out.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == ":quit" {
            break;
        }
        if let Err(err) = run_query(decoder, trimmed, cli, out) {
            writeln!(out, "error: {err}")?;
        }
        out.flush()?;
    }

    Ok(())
}
