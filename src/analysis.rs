//! Per-question analysis of a loaded table.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use log::{info, warn};
use rayon::prelude::*;
use serde::{Serialize, Serializer};

use crate::chart::ChartRenderer;
use crate::data::model::{ColumnType, Table};
use crate::llm::TextGenerator;
use crate::report::prompt::PromptBuilder;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One asked question and the text that came back for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Outcome of one analysis run. Built once by [`Analyzer::analyze`] and only
/// read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    source: PathBuf,
    template: String,
    shape: (usize, usize),
    columns: Vec<String>,
    #[serde(serialize_with = "ordered_map")]
    dtypes: Vec<(String, ColumnType)>,
    analyses: Vec<QaPair>,
    chart_path: Option<PathBuf>,
    error: Option<String>,
    generated_at: NaiveDateTime,
}

fn ordered_map<S: Serializer>(pairs: &[(String, ColumnType)], s: S) -> Result<S::Ok, S::Error> {
    s.collect_map(pairs.iter().map(|(k, v)| (k, v.dtype_name())))
}

impl AnalysisReport {
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// `(rows, columns)` of the analyzed table.
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Column name → type, in column order.
    pub fn dtypes(&self) -> &[(String, ColumnType)] {
        &self.dtypes
    }

    pub fn analyses(&self) -> &[QaPair] {
        &self.analyses
    }

    pub fn chart_path(&self) -> Option<&Path> {
        self.chart_path.as_deref()
    }

    /// Why the chart could not be produced, if it was requested and failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn generated_at(&self) -> NaiveDateTime {
        self.generated_at
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Asks every question about a table and gathers the answers.
pub struct Analyzer<'a> {
    generator: &'a dyn TextGenerator,
    charts: Option<&'a dyn ChartRenderer>,
    language: String,
    preview_rows: usize,
    concurrency: usize,
}

impl<'a> Analyzer<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Analyzer {
            generator,
            charts: None,
            language: "English".to_string(),
            preview_rows: 5,
            concurrency: 1,
        }
    }

    pub fn with_charts(mut self, renderer: &'a dyn ChartRenderer) -> Self {
        self.charts = Some(renderer);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }

    /// Questions in flight at once. Values of 0 and 1 both mean sequential.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Run every question against the table. Never fails: a failed request
    /// becomes an `Error: ...` answer and a failed chart is recorded in
    /// [`AnalysisReport::error`].
    pub fn analyze(
        &self,
        table: &Table,
        source: &Path,
        template: &str,
        questions: &[String],
    ) -> AnalysisReport {
        let prompts = PromptBuilder::new(table, source, &self.language, self.preview_rows);

        let analyses = if self.concurrency > 1 && questions.len() > 1 {
            self.ask_parallel(&prompts, questions)
        } else {
            questions
                .iter()
                .enumerate()
                .map(|(i, q)| self.ask(&prompts, i, questions.len(), q))
                .collect()
        };

        let (chart_path, error) = match self.charts {
            Some(renderer) => match renderer.render(table, source) {
                Ok(path) => {
                    info!("Chart saved: {}", path.display());
                    (Some(path), None)
                }
                Err(e) => {
                    warn!("Chart generation failed: {e}");
                    (None, Some(e.to_string()))
                }
            },
            None => (None, None),
        };

        AnalysisReport {
            source: source.to_path_buf(),
            template: template.to_string(),
            shape: table.shape(),
            columns: table.column_names(),
            dtypes: table
                .columns()
                .iter()
                .map(|c| (c.name.clone(), c.dtype))
                .collect(),
            analyses,
            chart_path,
            error,
            generated_at: Local::now().naive_local(),
        }
    }

    /// One task per question on a dedicated pool; `collect` keeps question
    /// order regardless of completion order.
    fn ask_parallel(&self, prompts: &PromptBuilder, questions: &[String]) -> Vec<QaPair> {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!("Could not start worker pool ({e}), asking sequentially");
                return questions
                    .iter()
                    .enumerate()
                    .map(|(i, q)| self.ask(prompts, i, questions.len(), q))
                    .collect();
            }
        };
        pool.install(|| {
            questions
                .par_iter()
                .enumerate()
                .map(|(i, q)| self.ask(prompts, i, questions.len(), q))
                .collect()
        })
    }

    fn ask(&self, prompts: &PromptBuilder, index: usize, total: usize, question: &str) -> QaPair {
        info!("Question {}/{}: {}", index + 1, total, question);
        let prompt = prompts.build(question);
        let answer = match self.generator.generate(&prompt) {
            Ok(text) => text,
            Err(e) => {
                warn!("Question {} failed: {e}", index + 1);
                format!("Error: {e}")
            }
        };
        QaPair {
            question: question.to_string(),
            answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, Value};
    use crate::error::{ChartError, LlmError};
    use crate::report::prompt::QUESTION_PREFIX;
    use crate::report::templates::get_template;

    /// Answers `OK:<question>` by reading the question line back out of the prompt.
    struct EchoGenerator;

    fn question_of(prompt: &str) -> String {
        prompt
            .lines()
            .find_map(|l| l.strip_prefix(QUESTION_PREFIX))
            .unwrap_or_default()
            .to_string()
    }

    impl TextGenerator for EchoGenerator {
        fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            Ok(format!("OK:{}", question_of(prompt)))
        }

        fn list_models(&self) -> Result<Vec<String>, LlmError> {
            Ok(vec!["echo".into()])
        }
    }

    /// Fails every question whose text starts with `fail`.
    struct FlakyGenerator;

    impl TextGenerator for FlakyGenerator {
        fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            let q = question_of(prompt);
            if q.starts_with("fail") {
                Err(LlmError::Http {
                    status: 503,
                    body: "busy".into(),
                })
            } else {
                Ok(format!("OK:{q}"))
            }
        }

        fn list_models(&self) -> Result<Vec<String>, LlmError> {
            Ok(Vec::new())
        }
    }

    struct BrokenCharts;

    impl ChartRenderer for BrokenCharts {
        fn render(&self, _table: &Table, _source: &Path) -> Result<PathBuf, ChartError> {
            Err(ChartError::EmptyTable)
        }
    }

    fn table() -> Table {
        Table::new(vec![
            Column::new(
                "amount",
                ColumnType::Float,
                vec![Value::Float(1.0), Value::Float(2.0)],
            ),
            Column::new(
                "region",
                ColumnType::Text,
                vec![Value::Text("north".into()), Value::Text("south".into())],
            ),
        ])
        .unwrap()
    }

    fn qs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn answers_follow_question_order() {
        let analyzer = Analyzer::new(&EchoGenerator);
        let report = analyzer.analyze(&table(), Path::new("sales.csv"), "custom", &qs(&["a", "b", "a"]));

        let answers: Vec<&str> = report.analyses().iter().map(|p| p.answer.as_str()).collect();
        assert_eq!(answers, vec!["OK:a", "OK:b", "OK:a"]);
        assert_eq!(report.shape(), (2, 2));
        assert_eq!(report.columns(), &["amount".to_string(), "region".to_string()]);
        assert_eq!(report.template(), "custom");
        assert!(report.chart_path().is_none());
        assert!(report.error().is_none());
    }

    #[test]
    fn failed_request_becomes_error_answer() {
        let analyzer = Analyzer::new(&FlakyGenerator);
        let report = analyzer.analyze(&table(), Path::new("sales.csv"), "custom", &qs(&["fail one", "two"]));

        assert_eq!(report.analyses()[0].answer, "Error: HTTP 503: busy");
        assert_eq!(report.analyses()[1].answer, "OK:two");
    }

    #[test]
    fn builtin_template_yields_one_entry_per_question() {
        let questions = qs(get_template("basic").unwrap());
        let report = Analyzer::new(&EchoGenerator).analyze(&table(), Path::new("s.csv"), "basic", &questions);
        assert_eq!(report.analyses().len(), 4);
        for (pair, q) in report.analyses().iter().zip(&questions) {
            assert_eq!(&pair.question, q);
            assert_eq!(pair.answer, format!("OK:{q}"));
        }
    }

    #[test]
    fn basic_template_on_csv_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("numbers.csv");
        std::fs::write(&path, "x,y\n1,2.5\n2,3.5\n3,4.5\n").unwrap();
        let table = crate::data::loader::load_file(&path, &Default::default()).unwrap();

        let (template, questions) = crate::report::templates::resolve_questions(Some("basic"), Vec::new()).unwrap();
        let report = Analyzer::new(&EchoGenerator).analyze(&table, &path, &template, &questions);

        assert_eq!(report.shape(), (3, 2));
        assert_eq!(
            report.dtypes(),
            &[("x".to_string(), ColumnType::Integer), ("y".to_string(), ColumnType::Float)]
        );
        let expected: Vec<QaPair> = get_template("basic")
            .unwrap()
            .iter()
            .map(|q| QaPair {
                question: q.to_string(),
                answer: format!("OK:{q}"),
            })
            .collect();
        assert_eq!(report.analyses(), expected.as_slice());
    }

    #[test]
    fn rerunning_gives_the_same_analyses() {
        let analyzer = Analyzer::new(&EchoGenerator);
        let questions = qs(&["x", "y"]);
        let first = analyzer.analyze(&table(), Path::new("s.csv"), "custom", &questions);
        let second = analyzer.analyze(&table(), Path::new("s.csv"), "custom", &questions);
        assert_eq!(first.analyses(), second.analyses());
    }

    #[test]
    fn concurrent_run_keeps_order() {
        let questions: Vec<String> = (0..16).map(|i| format!("q{i}")).collect();
        let report = Analyzer::new(&EchoGenerator)
            .concurrency(4)
            .analyze(&table(), Path::new("s.csv"), "custom", &questions);
        let expected: Vec<String> = questions.iter().map(|q| format!("OK:{q}")).collect();
        let answers: Vec<String> = report.analyses().iter().map(|p| p.answer.clone()).collect();
        assert_eq!(answers, expected);
    }

    #[test]
    fn chart_failure_is_recorded_not_fatal() {
        let report = Analyzer::new(&EchoGenerator)
            .with_charts(&BrokenCharts)
            .analyze(&table(), Path::new("s.csv"), "custom", &qs(&["a"]));
        assert_eq!(report.analyses().len(), 1);
        assert!(report.chart_path().is_none());
        assert_eq!(report.error(), Some("Table has no rows or columns to chart"));
    }

    #[test]
    fn json_keeps_dtype_order() {
        let report = Analyzer::new(&EchoGenerator).analyze(&table(), Path::new("s.csv"), "custom", &qs(&["a"]));
        let json = serde_json::to_string(&report).unwrap();
        let amount = json.find("\"amount\":\"float64\"").unwrap();
        let region = json.find("\"region\":\"object\"").unwrap();
        assert!(amount < region);
    }
}
