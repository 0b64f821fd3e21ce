//! rusty-analyst: load a tabular data file, ask a language model a set of
//! report questions about it, and write the answers plus a chart grid.

mod analysis;
mod chart;
mod color;
mod commands;
mod config;
mod data;
mod error;
mod llm;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use crate::commands::{CliError, EXIT_SUCCESS};
use crate::config::Backend;

/// Multi-format data analyzer backed by a local or remote language model
#[derive(Parser, Debug)]
#[command(name = "rusty-analyst")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a data file with a report template
    #[command(after_help = "\
Examples:
  rusty-analyst analyze sales.csv quality
  rusty-analyst analyze sales.xlsx business --sheet 1
  rusty-analyst analyze sales.csv custom 'Analyze the sales trend' 'Forecast revenue growth'
  rusty-analyst analyze sales.parquet --backend chat-completions --base-url https://api.deepseek.com/v1 --model deepseek-chat")]
    Analyze(AnalyzeArgs),

    /// Recursively list supported data files under a directory
    List {
        /// Directory to scan
        dir: PathBuf,
    },

    /// Show the available report templates
    Templates,

    /// Check the text-generation endpoint and list its models
    Models {
        #[command(flatten)]
        llm: LlmArgs,
    },
}

/// Endpoint selection shared by `analyze` and `models`.
#[derive(Args, Debug, Clone, Default)]
pub struct LlmArgs {
    /// Path to configuration file (rusty-analyst.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Text-generation backend
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Endpoint base URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Model name
    #[arg(short, long)]
    pub model: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Data file (.csv .tsv .txt .json .xlsx .xls .parquet)
    pub path: PathBuf,

    /// Report template (basic, quality, business, statistical, predictive,
    /// correlation, anomaly, comprehensive, custom)
    pub template: Option<String>,

    /// Questions for the `custom` template
    pub questions: Vec<String>,

    #[command(flatten)]
    pub llm: LlmArgs,

    /// Directory for the report and chart
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Also write the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip chart rendering
    #[arg(long)]
    pub no_chart: bool,

    /// Do not ask the endpoint for its model list before analyzing
    #[arg(long)]
    pub skip_health_check: bool,

    /// Language the answers should be written in
    #[arg(long)]
    pub language: Option<String>,

    /// Questions sent at once (1 = sequential)
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Field separator for delimited text (single character, `\t` for tab)
    #[arg(long, value_name = "CHAR")]
    pub sep: Option<String>,

    /// Text encoding label (e.g. utf-8, latin1, gbk)
    #[arg(long)]
    pub encoding: Option<String>,

    /// Worksheet index for Excel files
    #[arg(long, default_value_t = 0)]
    pub sheet: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    log::debug!("rusty-analyst v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Analyze(args) => commands::cmd_analyze(args),
        Commands::List { dir } => commands::cmd_list(&dir),
        Commands::Templates => commands::cmd_templates(),
        Commands::Models { llm } => commands::cmd_models(&llm),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            eprintln!("error: {message}");
            if let Some(hint) = hint {
                eprintln!("hint:  {hint}");
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
