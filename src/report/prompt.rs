use std::path::Path;

use crate::data::model::Table;
use crate::data::stats;

/// Marker preceding the literal question text in every prompt.
pub const QUESTION_PREFIX: &str = "Question: ";

/// Prompt builder for one table. The table-dependent part (file info,
/// preview, statistics) is rendered once and shared by every question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    header: String,
    language: String,
}

impl PromptBuilder {
    pub fn new(table: &Table, source: &Path, language: &str, preview_rows: usize) -> Self {
        let (rows, cols) = table.shape();
        let columns = table
            .column_names()
            .iter()
            .map(|c| format!("'{c}'"))
            .collect::<Vec<_>>()
            .join(", ");

        let header = format!(
            "You are a professional data analyst. Analyze the following data and answer the question.\n\
             \n\
             File information:\n\
             - Path: {}\n\
             - Shape: ({rows}, {cols})\n\
             - Columns: [{columns}]\n\
             \n\
             Data preview:\n\
             {}\n\
             \n\
             Statistics:\n\
             {}\n",
            source.display(),
            stats::preview(table, preview_rows),
            stats::describe(table),
        );
        PromptBuilder {
            header,
            language: language.to_string(),
        }
    }

    /// Full prompt for one question.
    pub fn build(&self, question: &str) -> String {
        format!(
            "{}\n\
             {QUESTION_PREFIX}{question}\n\
             \n\
             Please provide:\n\
             1. A detailed data analysis\n\
             2. Key findings and insights\n\
             3. Practical recommendations\n\
             4. An answer in {}, clearly structured\n",
            self.header, self.language
        )
    }
}
