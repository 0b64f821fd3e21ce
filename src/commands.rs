//! Subcommand implementations and their exit codes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{info, warn};

use crate::analysis::{AnalysisReport, Analyzer};
use crate::chart::{ChartRenderer, PngChartRenderer};
use crate::config::{load_config, AppConfig};
use crate::data::format::{self, ReadOptions};
use crate::data::loader::load_file;
use crate::data::stats;
use crate::error::{LlmError, TemplateError};
use crate::llm::{build_generator, TextGenerator};
use crate::report::templates::{self, resolve_questions};
use crate::report::writer;
use crate::{AnalyzeArgs, LlmArgs};

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Failure - load, IO or endpoint error.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad template name, missing custom questions, bad flag value.
pub const EXIT_USAGE: u8 = 2;

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::failure(format!("{err:#}"))
    }
}

impl From<TemplateError> for CliError {
    fn from(err: TemplateError) -> Self {
        let hint = match &err {
            TemplateError::MissingQuestions => {
                Some("example: rusty-analyst analyze data.csv custom 'Analyze the sales trend'".to_string())
            }
            TemplateError::UnknownTemplate { .. } => {
                Some("run `rusty-analyst templates` to see every template".to_string())
            }
        };
        CliError { code: EXIT_USAGE, message: err.to_string(), hint }
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

/// Config file (if any) with command-line overrides applied.
fn resolve_config(llm: &LlmArgs) -> anyhow::Result<AppConfig> {
    let mut config = match &llm.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(backend) = llm.backend {
        config.llm.backend = backend;
    }
    if let Some(url) = &llm.base_url {
        config.llm.base_url = url.clone();
    }
    if let Some(model) = &llm.model {
        config.llm.model = model.clone();
    }
    Ok(config)
}

fn connect(config: &AppConfig) -> Result<Box<dyn TextGenerator>, CliError> {
    build_generator(&config.llm).map_err(|e| {
        let err = CliError::failure(e.to_string());
        match e {
            LlmError::MissingApiKey(_) => err.with_hint("set the key variable or `api_key_env` in the [llm] config section"),
            _ => err,
        }
    })
}

/// Ask the endpoint for its models; an error or an empty list is fatal.
fn health_check(generator: &dyn TextGenerator, config: &AppConfig) -> Result<Vec<String>, CliError> {
    let models = generator.list_models().map_err(|e| {
        CliError::failure(format!(
            "Cannot reach {} endpoint at {}: {e}",
            config.llm.backend, config.llm.base_url
        ))
        .with_hint("is the server running? (`ollama serve` for a local Ollama)")
    })?;
    if models.is_empty() {
        return Err(CliError::failure(format!(
            "No models available at {}",
            config.llm.base_url
        ))
        .with_hint("download a model first, e.g. `ollama pull codellama:7b`"));
    }
    Ok(models)
}

/// Parse `--sep`: one ASCII character, or the escapes `\t` / `tab`.
pub fn parse_separator(raw: &str) -> Result<u8, CliError> {
    match raw {
        "\\t" | "tab" => Ok(b'\t'),
        s if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        _ => Err(CliError::usage(format!(
            "Separator must be a single ASCII character, got {raw:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

pub fn cmd_analyze(args: AnalyzeArgs) -> Result<(), CliError> {
    let (template, questions) = resolve_questions(args.template.as_deref(), args.questions)?;

    let separator = args.sep.as_deref().map(parse_separator).transpose()?;
    let mut config = resolve_config(&args.llm)?;
    if let Some(dir) = args.output_dir {
        config.output.dir = dir;
    }
    if let Some(language) = args.language {
        config.analysis.language = language;
    }
    if let Some(n) = args.concurrency {
        config.analysis.concurrency = n;
    }
    if args.json {
        config.output.json = true;
    }
    if args.no_chart {
        config.output.chart = false;
    }

    let options = ReadOptions {
        encoding: args.encoding,
        separator,
        sheet: args.sheet,
    };
    let table = load_file(&args.path, &options).map_err(|e| CliError::failure(e.to_string()))?;
    let quality = stats::quality(&table);
    info!(
        "Completeness {:.1}%, {} missing cells, {} duplicate rows",
        quality.completeness, quality.missing, quality.duplicate_rows
    );

    let generator = connect(&config)?;
    if args.skip_health_check {
        info!("Skipping health check");
    } else {
        let models = health_check(generator.as_ref(), &config)?;
        info!("Endpoint ready ({} models)", models.len());
    }

    let renderer = PngChartRenderer::new(&config.output.dir);
    let mut analyzer = Analyzer::new(generator.as_ref())
        .language(config.analysis.language.as_str())
        .preview_rows(config.analysis.preview_rows)
        .concurrency(config.analysis.concurrency);
    if config.output.chart {
        analyzer = analyzer.with_charts(&renderer as &dyn ChartRenderer);
    }
    let report = analyzer.analyze(&table, &args.path, &template, &questions);

    print!("{}", summary(&report));
    println!("\n{}\n", stats::preview(&table, config.analysis.preview_rows));
    for (i, pair) in report.analyses().iter().enumerate() {
        println!("## Analysis {}: {}\n", i + 1, pair.question);
        println!("{}\n", pair.answer);
        println!("{}", "-".repeat(40));
    }

    let report_path = writer::write_to_dir(&report, &config.output.dir, config.output.json)
        .map_err(|e| CliError::failure(e.to_string()))?;

    println!("\n{} report complete", template.to_uppercase());
    println!("Report: {}", report_path.display());
    if let Some(chart) = report.chart_path() {
        println!("Chart: {}", chart.display());
    }
    if let Some(reason) = report.error() {
        warn!("No chart: {reason}");
    }
    Ok(())
}

/// File, template, shape, columns and per-column types of an analyzed table.
fn summary(report: &AnalysisReport) -> String {
    let (rows, cols) = report.shape();
    let mut out = format!(
        "File: {}\nTemplate: {}\nShape: ({rows}, {cols})\nColumns: {}\nData types:\n",
        report.source().display(),
        report.template(),
        report.columns().join(", ")
    );
    for (name, dtype) in report.dtypes() {
        out.push_str(&format!("  {name}: {}\n", dtype.dtype_name()));
    }
    out
}

// ---------------------------------------------------------------------------
// list / templates / models
// ---------------------------------------------------------------------------

/// Supported data files under `dir`, recursively, sorted by path.
pub fn find_data_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    anyhow::ensure!(dir.is_dir(), "Directory not found: {}", dir.display());

    let pattern = format!("{}/**/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut files = Vec::new();
    for entry in glob::glob(&pattern).with_context(|| format!("Invalid directory pattern: {pattern}"))? {
        match entry {
            Ok(path) if path.is_file() && format::is_supported(&path) => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry: {e}"),
        }
    }
    files.sort();
    Ok(files)
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

pub fn cmd_list(dir: &Path) -> Result<(), CliError> {
    let files = find_data_files(dir)?;
    if files.is_empty() {
        println!("No supported data files in {}", dir.display());
        println!("Supported: {}", format::SUPPORTED_EXTENSIONS.join(", "));
        return Ok(());
    }
    for path in &files {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        println!("{:>10}  {}", human_size(size), path.display());
    }
    info!("{} data files", files.len());
    Ok(())
}

pub fn cmd_templates() -> Result<(), CliError> {
    for (name, questions) in templates::templates() {
        println!("{name}");
        println!("    {}", questions[0]);
    }
    println!("{}", templates::CUSTOM);
    println!("    your own questions, e.g. custom 'Analyze the sales trend' 'Forecast revenue growth'");
    Ok(())
}

pub fn cmd_models(llm: &LlmArgs) -> Result<(), CliError> {
    let config = resolve_config(llm)?;
    let generator = connect(&config)?;
    let models = health_check(generator.as_ref(), &config)?;
    for model in &models {
        let marker = if *model == config.llm.model { "*" } else { " " };
        println!("{marker} {model}");
    }
    Ok(())
}
