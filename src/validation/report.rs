//! Structured record of validation issues raised during a parse

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem found in one field of one line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub field: String,
    pub value: String,
    pub message: String,
    pub rule: String,
    pub line_number: Option<u64>,
    pub permit_number: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Where an issue was found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueContext {
    pub line_number: Option<u64>,
    pub permit_number: Option<String>,
}

impl IssueContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_line(mut self, line_number: u64) -> Self {
        self.line_number = Some(line_number);
        self
    }

    pub fn for_permit(mut self, permit_number: impl Into<String>) -> Self {
        self.permit_number = Some(permit_number.into());
        self
    }
}

/// Conjunctive issue filter; unset criteria match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueFilter {
    pub severity: Option<Severity>,
    pub field: Option<String>,
    pub permit_number: Option<String>,
    pub rule: Option<String>,
}

impl IssueFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_permit(mut self, permit_number: impl Into<String>) -> Self {
        self.permit_number = Some(permit_number.into());
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn matches(&self, issue: &ValidationIssue) -> bool {
        self.severity.is_none_or(|s| s == issue.severity)
            && self.field.as_ref().is_none_or(|f| *f == issue.field)
            && self
                .permit_number
                .as_ref()
                .is_none_or(|p| issue.permit_number.as_ref() == Some(p))
            && self.rule.as_ref().is_none_or(|r| *r == issue.rule)
    }
}

/// Aggregate counts over every recorded issue
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub total_errors: usize,
    pub total_warnings: usize,
    pub total: usize,
    pub by_field: BTreeMap<String, usize>,
    pub by_rule: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

impl fmt::Display for ValidationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(80);
        writeln!(f, "{}", rule)?;
        writeln!(f, "VALIDATION SUMMARY")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Total Issues: {}", self.total)?;
        writeln!(f, "  Errors:   {}", self.total_errors)?;
        writeln!(f, "  Warnings: {}", self.total_warnings)?;

        if !self.by_field.is_empty() {
            writeln!(f, "\nIssues by Field:")?;
            for (field, count) in sorted_by_count(&self.by_field).into_iter().take(10) {
                writeln!(f, "  {:<30} {}", field, count)?;
            }
        }

        if !self.by_rule.is_empty() {
            writeln!(f, "\nIssues by Rule:")?;
            for (rule, count) in sorted_by_count(&self.by_rule) {
                writeln!(f, "  {:<30} {}", rule, count)?;
            }
        }
        Ok(())
    }
}

fn sorted_by_count(counts: &BTreeMap<String, usize>) -> Vec<(&String, &usize)> {
    let mut entries: Vec<_> = counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries
}

/// Append-only list of issues in the order they were raised
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a report from previously recorded issues
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    fn push(
        &mut self,
        severity: Severity,
        field: &str,
        value: &str,
        message: &str,
        rule: &str,
        context: IssueContext,
    ) {
        self.issues.push(ValidationIssue {
            severity,
            field: field.to_string(),
            value: value.to_string(),
            message: message.to_string(),
            rule: rule.to_string(),
            line_number: context.line_number,
            permit_number: context.permit_number,
            timestamp: Utc::now(),
        });
    }

    pub fn add_error(
        &mut self,
        field: &str,
        value: &str,
        message: &str,
        rule: &str,
        context: IssueContext,
    ) {
        self.push(Severity::Error, field, value, message, rule, context);
    }

    pub fn add_warning(
        &mut self,
        field: &str,
        value: &str,
        message: &str,
        rule: &str,
        context: IssueContext,
    ) {
        self.push(Severity::Warning, field, value, message, rule, context);
    }

    /// Issues matching `filter`, in insertion order
    pub fn issues(&self, filter: &IssueFilter) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| filter.matches(i)).collect()
    }

    pub fn all(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn permit_issues(&self, permit_number: &str) -> Vec<&ValidationIssue> {
        self.issues(&IssueFilter::new().with_permit(permit_number))
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn summary(&self) -> ValidationSummary {
        let mut summary = ValidationSummary {
            total: self.issues.len(),
            ..ValidationSummary::default()
        };
        summary.by_severity.insert(Severity::Error, 0);
        summary.by_severity.insert(Severity::Warning, 0);

        for issue in &self.issues {
            match issue.severity {
                Severity::Error => summary.total_errors += 1,
                Severity::Warning => summary.total_warnings += 1,
            }
            *summary.by_severity.entry(issue.severity).or_insert(0) += 1;
            *summary.by_field.entry(issue.field.clone()).or_insert(0) += 1;
            *summary.by_rule.entry(issue.rule.clone()).or_insert(0) += 1;
        }
        summary
    }

    pub fn clear(&mut self) {
        self.issues.clear();
    }

    /// Write every issue as one CSV row, header first
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record([
            "Severity",
            "Permit Number",
            "Line Number",
            "Field",
            "Value",
            "Rule",
            "Message",
            "Timestamp",
        ])?;

        for issue in &self.issues {
            let line = issue.line_number.map(|n| n.to_string()).unwrap_or_default();
            let timestamp = issue.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
            writer.write_record([
                issue.severity.as_str().to_uppercase().as_str(),
                issue.permit_number.as_deref().unwrap_or(""),
                line.as_str(),
                issue.field.as_str(),
                issue.value.as_str(),
                issue.rule.as_str(),
                issue.message.as_str(),
                timestamp.as_str(),
            ])?;
        }

        writer.flush()?;
        info!(
            "Exported {} validation issues to {}",
            self.issues.len(),
            path.display()
        );
        Ok(())
    }
}
