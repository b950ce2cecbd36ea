//! Value validation for decoded DAF420 fields
//!
//! Validator tags on field specs are resolved into a closed set of [`Rule`]s
//! when the configuration loads. The [`Validator`] applies those rules to raw
//! values and keeps per-context message buckets, while the
//! [`ValidationReport`] is the structured, filterable record of every issue
//! raised during a parse.

pub mod report;
pub mod rules;
pub mod validator;

#[cfg(test)]
pub mod tests;

pub use report::{
    IssueContext, IssueFilter, Severity, ValidationIssue, ValidationReport, ValidationSummary,
};
pub use rules::Rule;
pub use validator::{Validator, ValidatorSummary, Verdict};
