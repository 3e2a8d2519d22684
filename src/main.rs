use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;

use settingsq::emit::{self, MergeStrategy};
use settingsq::index::AssignmentIndex;
use settingsq::input;
use settingsq::logging::{self, LogConfig};
use settingsq::output::{self, RenderOptions};
use settingsq::query::{self, QueryOptions};

#[derive(Parser)]
#[command(
    name = "settingsq",
    version,
    about = "Query literal values in Python settings files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level [off, error, warn, info, debug, trace]
    #[arg(long = "log-level", global = true, default_value = "warn")]
    log_level: LevelFilter,

    /// Raise the log level (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Print the value at a dotted path, e.g. `.DATABASES.default.NAME`
    Query {
        /// Path query expression ("." returns the whole file)
        query: String,

        /// Input file ("-" or omitted reads stdin)
        infile: Option<PathBuf>,

        /// Write output to a file instead of stdout
        #[arg(short, long)]
        outfile: Option<PathBuf>,

        /// Raw string output (no quotes for string values)
        #[arg(short, long = "raw-strings")]
        raw: bool,

        /// Format the resolved dict, e.g. "{USER}@{HOST}:{PORT}"
        #[arg(short, long = "format")]
        format_str: Option<String>,

        /// Ignore slicing suffixes in format placeholders
        #[arg(long)]
        no_eval: bool,
    },

    /// Print every indexed assignment as JSON
    List {
        /// Input file ("-" or omitted reads stdin)
        infile: Option<PathBuf>,
    },

    /// Write a literal value at a path
    Emit {
        /// Target path: `.NAME` or `.NAME.key`
        query: String,

        /// Python literal to write, e.g. "['*']"
        literal: String,

        /// Input file ("-" or omitted reads stdin)
        infile: Option<PathBuf>,

        /// Write output to a file instead of stdout
        #[arg(short, long, conflicts_with = "in_place")]
        outfile: Option<PathBuf>,

        /// Edit the input file in place
        #[arg(short, long = "in-place")]
        in_place: bool,

        /// Merge strategy [upsert, merge_into, merge_from]
        #[arg(short, long, default_value = "upsert")]
        strategy: MergeStrategy,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&LogConfig::with_verbosity(cli.log_level, cli.verbose));

    match cli.command {
        Command::Query {
            query,
            infile,
            outfile,
            raw,
            format_str,
            no_eval,
        } => {
            let source = read_input(infile.as_deref())?;
            let options = QueryOptions {
                format_str,
                eval: !no_eval,
            };
            let result = query::query(&source, &query, &options)?;
            let formatted = output::format_result(&result, RenderOptions { raw })?;
            write_output(outfile.as_deref(), &formatted)
        }
        Command::List { infile } => {
            let source = read_input(infile.as_deref())?;
            let index = AssignmentIndex::from_source(&source)?;
            let mut formatted = serde_json::to_string_pretty(&index.listing())?;
            formatted.push('\n');
            write_output(None, &formatted)
        }
        Command::Emit {
            query,
            literal,
            infile,
            outfile,
            in_place,
            strategy,
        } => {
            emit::check_strategy(strategy)?;

            // Validate: -i requires a file argument
            let target = infile.as_deref().filter(|p| !input::is_stdin(Some(*p)));
            if in_place && target.is_none() {
                anyhow::bail!("--in-place requires a file argument");
            }

            let source = read_input(infile.as_deref())?;
            let updated = emit::emit(&source, &query, &literal, strategy)?;

            match target {
                Some(path) if in_place => replace_file(path, &updated),
                _ => write_output(outfile.as_deref(), &updated),
            }
        }
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    input::read_source(path).with_context(|| match path {
        Some(p) if !input::is_stdin(Some(p)) => format!("reading {}", p.display()),
        _ => "reading stdin".to_string(),
    })
}

/// Write to `path`, or stdout. The file is only created once the output is
/// final, so a failed query never truncates it.
fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("writing {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|_| stdout.flush())
                .context("writing stdout")
        }
    }
}

fn replace_file(path: &Path, text: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent).context("creating temporary file")?;
    tmp.write_all(text.as_bytes())
        .context("writing temporary file")?;
    tmp.persist(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
