use crate::error::TemplateError;

// ---------------------------------------------------------------------------
// Template catalog
// ---------------------------------------------------------------------------

/// Name of the caller-supplied template.
pub const CUSTOM: &str = "custom";

/// Template used when no name is given.
pub const DEFAULT_TEMPLATE: &str = "comprehensive";

const BASIC: &[&str] = &[
    "Analyze the basic statistical information of this dataset",
    "What are the main trends and patterns in the data?",
    "Are there outliers or data quality issues that need attention?",
    "Based on this data, what business insights and recommendations do you have?",
];

const QUALITY: &[&str] = &[
    "Produce a complete data quality assessment covering completeness, consistency and accuracy",
    "Detect and report every data quality problem: missing values, duplicates, outliers and format errors",
    "Assess how trustworthy and usable the data is, and suggest cleaning steps",
    "Analyze the stability of the data source and potential problems in how the data was collected",
];

const BUSINESS: &[&str] = &[
    "Build a business intelligence dashboard showing the key business metrics and KPIs",
    "Analyze business trends and identify growth opportunities and risks",
    "Provide actionable business insights and strategic recommendations",
    "Write a data-driven decision support report aimed at management",
];

const STATISTICAL: &[&str] = &[
    "Produce detailed descriptive statistics including mean, median, standard deviation and quantiles",
    "Analyze the data distributions, including normality, skewness and kurtosis",
    "Run hypothesis tests to check the statistical significance of the data",
    "Write a confidence interval and statistical inference report",
];

const PREDICTIVE: &[&str] = &[
    "Forecast trends and estimate future values from the historical data",
    "Identify seasonal patterns and cyclical changes in the data",
    "Propose a predictive model and evaluate its expected accuracy",
    "Provide a risk assessment and an analysis of the uncertainty",
];

const CORRELATION: &[&str] = &[
    "Build a full correlation matrix and describe how the variables relate to each other",
    "Identify strongly and weakly correlated variable pairs and discuss causality",
    "Run a multivariate analysis to explore complex interaction effects",
    "Suggest feature selection and dimensionality reduction based on the correlations",
];

const ANOMALY: &[&str] = &[
    "Detect outliers and anomalous points in the data using several statistical methods",
    "Analyze how the outliers are distributed and what may have caused them",
    "Assess the impact of the outliers on the overall analysis",
    "Propose strategies for handling outliers and a data cleaning plan",
];

const COMPREHENSIVE: &[&str] = &[
    "Produce a comprehensive data science report covering data quality, statistics and business insights",
    "Explore the data along several dimensions, including univariate, bivariate and multivariate analysis",
    "Tell the complete data story, from raw data to actionable insights",
    "Design a data analysis pipeline that supports continuous monitoring and analysis",
];

const CATALOG: &[(&str, &[&str])] = &[
    ("basic", BASIC),
    ("quality", QUALITY),
    ("business", BUSINESS),
    ("statistical", STATISTICAL),
    ("predictive", PREDICTIVE),
    ("correlation", CORRELATION),
    ("anomaly", ANOMALY),
    ("comprehensive", COMPREHENSIVE),
];

/// Every built-in template with its questions, in catalog order.
pub fn templates() -> &'static [(&'static str, &'static [&'static str])] {
    CATALOG
}

/// Names accepted on the command line, `custom` included.
pub fn valid_names() -> Vec<&'static str> {
    CATALOG
        .iter()
        .map(|(name, _)| *name)
        .chain(std::iter::once(CUSTOM))
        .collect()
}

/// Look up a built-in template by name (case-insensitive).
pub fn get_template(name: &str) -> Result<&'static [&'static str], TemplateError> {
    let wanted = name.to_lowercase();
    CATALOG
        .iter()
        .find(|(n, _)| *n == wanted)
        .map(|(_, questions)| *questions)
        .ok_or_else(|| TemplateError::UnknownTemplate {
            name: name.to_string(),
            valid: valid_names(),
        })
}

/// Turn a template name plus optional custom questions into the question
/// list for a run. Returns the normalized template name with the questions.
///
/// No name selects [`DEFAULT_TEMPLATE`]. Extra questions given with a
/// built-in template are ignored.
pub fn resolve_questions(
    name: Option<&str>,
    custom: Vec<String>,
) -> Result<(String, Vec<String>), TemplateError> {
    let name = name.unwrap_or(DEFAULT_TEMPLATE).to_lowercase();
    if name == CUSTOM {
        if custom.is_empty() {
            return Err(TemplateError::MissingQuestions);
        }
        return Ok((name, custom));
    }
    let questions = get_template(&name)?
        .iter()
        .map(|q| q.to_string())
        .collect();
    Ok((name, questions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_has_four_questions() {
        assert_eq!(templates().len(), 8);
        for (name, questions) in templates() {
            assert_eq!(questions.len(), 4, "{name}");
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(get_template("Quality").unwrap(), QUALITY);
        assert_eq!(get_template("BASIC").unwrap()[0], BASIC[0]);
    }

    #[test]
    fn unknown_template_lists_valid_names() {
        match get_template("weekly") {
            Err(TemplateError::UnknownTemplate { name, valid }) => {
                assert_eq!(name, "weekly");
                assert_eq!(valid.len(), 9);
                assert!(valid.contains(&"comprehensive"));
                assert!(valid.contains(&"custom"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn default_is_comprehensive() {
        let (name, questions) = resolve_questions(None, Vec::new()).unwrap();
        assert_eq!(name, "comprehensive");
        assert_eq!(questions, COMPREHENSIVE);
    }

    #[test]
    fn custom_needs_questions() {
        assert_eq!(
            resolve_questions(Some("custom"), Vec::new()),
            Err(TemplateError::MissingQuestions)
        );
        let (name, questions) =
            resolve_questions(Some("Custom"), vec!["Q1".into(), "Q2".into()]).unwrap();
        assert_eq!(name, "custom");
        assert_eq!(questions, vec!["Q1", "Q2"]);
    }

    #[test]
    fn extra_questions_are_ignored_for_builtin_templates() {
        let (_, questions) = resolve_questions(Some("anomaly"), vec!["ignored".into()]).unwrap();
        assert_eq!(questions, ANOMALY);
    }
}
