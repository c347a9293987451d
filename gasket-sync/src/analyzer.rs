//! Content safety analyzer collaborator.
//!
//! The executor hands every applied script file to a [`ContentAnalyzer`] and
//! collects the non-empty reports. What counts as a finding is up to the
//! implementation.

use serde::Serialize;

/// Knobs passed through to the analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzeOptions {
    /// Report hints as well as warnings.
    pub include_hints: bool,
}

/// Findings for one piece of content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub warnings: Vec<String>,
    pub hints: Vec<String>,
}

impl AnalysisReport {
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.hints.is_empty()
    }
}

/// Findings attached to a filename in an execution result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysis {
    pub filename: String,
    pub warnings: Vec<String>,
    pub hints: Vec<String>,
}

pub trait ContentAnalyzer: Send + Sync {
    fn analyze(
        &self,
        content: &str,
        options: &AnalyzeOptions,
        filename: Option<&str>,
    ) -> AnalysisReport;
}
