//! pdfgraft command line
//!
//! Merge, split, reorder and inspect PDF files with pdfgraft-core.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pdfgraft_core::{
    apply_commands, merge, parse_commands, rearrange_pages, split, Document, MergeOptions,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pdfgraft")]
#[command(version, about = "Page-level PDF assembly and inspection")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Options used when writing PDFs, e.g. "compress,garbage=compact"
    #[arg(long, global = true, default_value = "compress,garbage")]
    save_options: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy pages from one or more sources into a target document
    Merge {
        target: PathBuf,
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        /// First source page (0-based)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        from: i64,
        /// Last source page, inclusive; -1 for the last page
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        to: i64,
        /// Insertion index in the target; -1 appends
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        start_at: i64,
        /// Degrees added to each copied page's rotation
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        rotate: i64,
        /// Leave link annotations behind
        #[arg(long)]
        no_links: bool,
        /// Leave non-link annotations behind
        #[arg(long)]
        no_annotations: bool,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Split a document into several files
    Split {
        input: PathBuf,
        /// Interval start indices; omit for one file per page
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        ranges: Vec<i64>,
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Reorder, drop or repeat pages
    Rearrange {
        input: PathBuf,
        /// New page order as 0-based indices
        #[arg(long, value_delimiter = ',', required = true)]
        order: Vec<usize>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the words of a page as JSON
    Words {
        input: PathBuf,
        #[arg(long, default_value_t = 0)]
        page: usize,
    },
    /// Print the images of a page as JSON
    Images {
        input: PathBuf,
        #[arg(long, default_value_t = 0)]
        page: usize,
    },
    /// Print the 0-based pages carrying a label
    Labels {
        input: PathBuf,
        label: String,
        /// Stop at the first match
        #[arg(long)]
        first: bool,
    },
    /// Apply a JSON command script and print the journal
    Edit {
        input: PathBuf,
        #[arg(long)]
        commands: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let output = run(&cli)?;
    if let Some(output) = output {
        println!("{}", output);
    }
    Ok(())
}

/// Execute one subcommand. Returns text for stdout, if any.
fn run(cli: &Cli) -> Result<Option<String>> {
    match &cli.command {
        Command::Merge {
            target,
            sources,
            from,
            to,
            start_at,
            rotate,
            no_links,
            no_annotations,
            output,
        } => {
            let mut doc = open(target)?;
            let mut options = MergeOptions {
                from: *from,
                to: *to,
                start_at: *start_at,
                rotate: *rotate,
                copy_links: !no_links,
                copy_annotations: !no_annotations,
            };
            for source in sources {
                let src = open(source)?;
                let before = doc.page_count()?;
                merge(&mut doc, &src, options)
                    .with_context(|| format!("merging {}", source.display()))?;
                // Sources keep command-line order when inserting mid-document
                if options.start_at >= 0 {
                    options.start_at += (doc.page_count()? - before) as i64;
                }
            }
            save(&mut doc, output, &cli.save_options)?;
            Ok(None)
        }
        Command::Split {
            input,
            ranges,
            out_dir,
        } => {
            let doc = open(input)?;
            let ranges = (!ranges.is_empty()).then_some(ranges.as_slice());
            let parts = split(&doc, ranges)?;

            fs::create_dir_all(out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "part".to_string());
            for (i, mut part) in parts.into_iter().enumerate() {
                let path = out_dir.join(format!("{}-{}.pdf", stem, i + 1));
                save(&mut part, &path, &cli.save_options)?;
            }
            Ok(None)
        }
        Command::Rearrange {
            input,
            order,
            output,
        } => {
            let mut doc = open(input)?;
            rearrange_pages(&mut doc, order)?;
            save(&mut doc, output, &cli.save_options)?;
            Ok(None)
        }
        Command::Words { input, page } => {
            let doc = open(input)?;
            let words = doc.load_page(*page)?.words()?;
            Ok(Some(serde_json::to_string_pretty(&words)?))
        }
        Command::Images { input, page } => {
            let doc = open(input)?;
            let images = doc.load_page(*page)?.images()?;
            Ok(Some(serde_json::to_string_pretty(&images)?))
        }
        Command::Labels {
            input,
            label,
            first,
        } => {
            let doc = open(input)?;
            let pages = doc.get_page_numbers(label, *first)?;
            Ok(Some(serde_json::to_string(&pages)?))
        }
        Command::Edit {
            input,
            commands,
            output,
        } => {
            let mut doc = open(input)?;
            let script = fs::read_to_string(commands)
                .with_context(|| format!("reading {}", commands.display()))?;
            let report = apply_commands(&mut doc, &parse_commands(&script)?)?;
            if let Some(failed) = report.results.iter().find(|r| !r.success) {
                bail!(
                    "command {} failed: {}",
                    failed.command,
                    failed.error.as_deref().unwrap_or("unknown error")
                );
            }
            save(&mut doc, output, &cli.save_options)?;
            Ok(Some(serde_json::to_string_pretty(&report)?))
        }
    }
}

fn open(path: &Path) -> Result<Document> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let doc = Document::open(&bytes).with_context(|| format!("parsing {}", path.display()))?;
    info!(path = %path.display(), pages = doc.page_count()?, "opened");
    Ok(doc)
}

fn save(doc: &mut Document, path: &Path, options: &str) -> Result<()> {
    let bytes = doc.save_to_buffer(options)?;
    fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote");
    Ok(())
}
