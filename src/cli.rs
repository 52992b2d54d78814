//! CLI module - Command-line interface definitions and handlers

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::backends::archive::ArchiveLimits;
use crate::core::config::{parse_exclusions, ExtractConfig};
use crate::core::model::RunReport;
use crate::core::progress::ProgressObserver;
use crate::core::render::{OutputFormat, RenderConfig, Renderer};
use crate::core::tokenizer::check_profiles;
use crate::flows::extract::{run_archive_file, run_directory, write_artifact};

/// codepack - turn a zipped project into one prompt-ready text file.
#[derive(Parser, Debug)]
#[command(name = "codepack")]
#[command(
    author,
    version,
    about,
    long_about = r#"codepack extracts a ZIP archive, keeps the files whose extensions you select,
skips excluded directories and files, and concatenates everything into a single
text with a header naming each file. It then counts the tokens of that text for
a chosen model.

If the archive contains exactly one top-level folder, paths are reported
relative to that folder.

Output formats (report on stdout):
- jsonl: one JSON object per file, then a summary line
- json: the whole report as one JSON object
- md: human-friendly summary
- text: the combined text itself

Examples:
    codepack extract project.zip
    codepack extract project.zip --ext py,js --exclude node_modules
    codepack dir ./checkout --model gpt-4o --format md
    codepack models
"#
)]
pub struct Cli {
    /// Output format (jsonl/json/md/text).
    #[arg(
        long,
        global = true,
        default_value = "jsonl",
        value_name = "FORMAT",
        long_help = "Select the output format for the run report.\n\n\
Supported values:\n\
- jsonl (default)\n\
- json\n\
- md (markdown)\n\
- text (the combined text only)"
    )]
    pub format: String,

    /// Pretty-print JSON/JSONL output with indentation.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Disable colored output (when applicable).
    #[arg(
        long,
        global = true,
        long_help = "Disable colored output. This is useful when piping to files or when your\n\
terminal does not support ANSI colors."
    )]
    pub no_color: bool,

    /// Quiet mode (errors only on stderr, no progress bar).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (debug diagnostics on stderr).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract a ZIP archive and combine its matching files.
    #[command(
        long_about = "Extract ARCHIVE into a temporary directory, discover files matching the\n\
selected extensions, concatenate them with path headers and count tokens.\n\n\
The combined text is written to <OUTPUT_DIR>/<name>_code_extract.txt unless it is\n\
empty or --no-artifact is given. The temporary directory is always removed.\n\n\
Examples:\n\
  codepack extract project.zip\n\
  codepack extract project.zip --ext .py --ext .md --output-dir out\n"
    )]
    Extract {
        /// ZIP archive to process.
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Combine matching files from an already-extracted directory.
    Dir {
        /// Directory to process.
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        #[command(flatten)]
        options: RunOptions,
    },

    /// List tokenizer profiles and whether their encodings load.
    Models,
}

/// Options shared by `extract` and `dir`
#[derive(Args, Debug, Default)]
pub struct RunOptions {
    /// File extensions to include (repeatable or comma-separated).
    #[arg(long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Directory or file names to exclude (repeatable).
    #[arg(long = "exclude", value_name = "NAME")]
    pub exclusions: Vec<String>,

    /// File with one exclusion name per line.
    #[arg(long, value_name = "FILE")]
    pub exclusions_file: Option<PathBuf>,

    /// Tokenizer profile used for counting.
    #[arg(long, value_name = "MODEL", env = "CODEPACK_MODEL")]
    pub model: Option<String>,

    /// TOML config file with extensions, exclusions and model.
    #[arg(long, value_name = "FILE", env = "CODEPACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Where the combined text file is written.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Do not write the combined text file.
    #[arg(long)]
    pub no_artifact: bool,
}

impl RunOptions {
    /// Config file (or defaults) overridden by command-line flags
    pub fn resolve_config(&self) -> Result<ExtractConfig> {
        let mut config = match &self.config {
            Some(path) => ExtractConfig::load(path)?,
            None => ExtractConfig::default(),
        };

        if !self.extensions.is_empty() {
            config.extensions = self.extensions.clone();
        }

        let mut exclusions = Vec::new();
        if let Some(path) = &self.exclusions_file {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Cannot read exclusions file {}", path.display()))?;
            exclusions.extend(parse_exclusions(&text));
        }
        exclusions.extend(self.exclusions.iter().cloned());
        if !exclusions.is_empty() {
            config.exclusions = exclusions;
        }

        if let Some(model) = &self.model {
            config.model = model.clone();
        }

        tracing::debug!(
            "Configuration: extensions={:?}, exclusions={:?}, model={}",
            config.extensions,
            config.exclusions,
            config.model
        );
        Ok(config)
    }
}

/// One line of `codepack models`
#[derive(Debug, Serialize)]
struct ProfileStatus {
    model: &'static str,
    encoding: &'static str,
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn init_tracing(quiet: bool, verbose: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.quiet, cli.verbose);
    tracing::debug!("codepack v{} starting", env!("CARGO_PKG_VERSION"));

    if cli.no_color {
        colored::control::set_override(false);
    }

    let format: OutputFormat = cli
        .format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let render_config = RenderConfig::new(format)
        .with_pretty(cli.pretty)
        .with_color(!cli.no_color && io::stdout().is_terminal());

    match cli.command {
        Commands::Extract { archive, options } => {
            let config = options.resolve_config()?;
            let mut observer = ProgressObserver::new(cli.quiet);
            let report =
                run_archive_file(&archive, &config, ArchiveLimits::default(), &mut observer)?;
            observer.finish();
            report_warnings(&observer, cli.quiet);
            finish_run(&report, &options, render_config, cli.quiet)
        }

        Commands::Dir { dir, options } => {
            let config = options.resolve_config()?;
            let name = source_name(&dir);
            let mut observer = ProgressObserver::new(cli.quiet);
            let report = run_directory(&dir, &name, &config, &mut observer)?;
            observer.finish();
            report_warnings(&observer, cli.quiet);
            finish_run(&report, &options, render_config, cli.quiet)
        }

        Commands::Models => run_models(render_config),
    }
}

/// Display name of a directory, resolving `.` and friends
fn source_name(dir: &Path) -> String {
    let resolved = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

fn report_warnings(observer: &ProgressObserver, quiet: bool) {
    let count = observer.warning_count();
    if count > 0 && !quiet {
        eprintln!("{} warning(s) during the run; see the report", count);
    }
}

fn finish_run(
    report: &RunReport,
    options: &RunOptions,
    render_config: RenderConfig,
    quiet: bool,
) -> Result<()> {
    if !options.no_artifact {
        if let Some(path) = write_artifact(report, &options.output_dir)? {
            if !quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
    }

    let stdout = io::stdout();
    Renderer::with_config(render_config)
        .render_to(report, stdout.lock())
        .context("Failed to write report")?;
    Ok(())
}

fn run_models(render_config: RenderConfig) -> Result<()> {
    let statuses: Vec<ProfileStatus> = check_profiles()
        .into_iter()
        .map(|(profile, loaded)| ProfileStatus {
            model: profile.name(),
            encoding: profile.encoding().name(),
            available: loaded.is_ok(),
            error: loaded.err(),
        })
        .collect();

    let pretty = render_config.pretty;
    let output = match render_config.format {
        OutputFormat::Json => to_json(&statuses, pretty),
        OutputFormat::Jsonl => statuses
            .iter()
            .map(|s| to_json(s, pretty))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Markdown | OutputFormat::Text => {
            let mut out = String::from("| Model | Encoding | Available |\n|---|---|---|\n");
            for s in &statuses {
                let available = match &s.error {
                    None => "yes".to_string(),
                    Some(e) => format!("no ({})", e),
                };
                out.push_str(&format!("| {} | {} | {} |\n", s.model, s.encoding, available));
            }
            out
        }
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", output.trim_end())?;
    Ok(())
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> String {
    let result = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    result.unwrap_or_default()
}
