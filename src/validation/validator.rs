//! Rule evaluation with per-context message buckets

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::processor::field_parsers::parse_numeric;
use crate::validation::Rule;

/// Outcome of checking one value
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    /// Value is readable but violates a rule
    Warning(String),
    /// Value could not be interpreted at all
    Error(String),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::Warning(m) | Verdict::Error(m) => Some(m),
        }
    }
}

/// Counts plus the message buckets keyed by context
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatorSummary {
    pub error_count: usize,
    pub warning_count: usize,
    pub errors_by_context: BTreeMap<String, Vec<String>>,
    pub warnings_by_context: BTreeMap<String, Vec<String>>,
}

/// Applies configured rules to raw field values.
///
/// Every failed check appends exactly one message to the bucket of its
/// context, so the same inputs always produce the same buckets.
#[derive(Debug, Clone)]
pub struct Validator {
    config: Arc<Config>,
    errors: BTreeMap<String, Vec<String>>,
    warnings: BTreeMap<String, Vec<String>>,
}

impl Validator {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            errors: BTreeMap::new(),
            warnings: BTreeMap::new(),
        }
    }

    /// Check a value without recording anything
    pub fn check(&self, tag: &str, value: &str) -> Verdict {
        if value.is_empty() {
            return Verdict::Pass;
        }

        match self.config.rule(tag).as_ref() {
            Rule::Lookup { table } => {
                if self.config.validate_lookup(table, value) {
                    Verdict::Pass
                } else {
                    Verdict::Warning(format!("Invalid {}: {}", tag, value))
                }
            }
            Rule::Flag => {
                let valid = &self.config.validation_rules().flags.valid_values;
                if valid.iter().any(|v| v == value) {
                    Verdict::Pass
                } else {
                    Verdict::Warning(format!("Invalid {}: {}", tag, value))
                }
            }
            Rule::Range { name } => self.check_range(name, value),
            Rule::OperatorNumber => self.check_operator_number(value),
            Rule::Placeholder | Rule::Unknown => Verdict::Pass,
        }
    }

    fn check_range(&self, name: &str, value: &str) -> Verdict {
        let Some(range) = self.config.validation_rules().ranges.get(name) else {
            return Verdict::Pass;
        };

        match parse_numeric(value, name) {
            Ok(None) => Verdict::Pass,
            Ok(Some(n)) if n < range.min || n > range.max => {
                Verdict::Warning(format!("{} outside {}: {}", name, range.description, n))
            }
            Ok(Some(_)) => Verdict::Pass,
            Err(e) => Verdict::Error(format!("Invalid {}: {} ({})", name, value, e)),
        }
    }

    fn check_operator_number(&self, value: &str) -> Verdict {
        let rules = &self.config.validation_rules().operator_number;

        if rules.numeric_only && !value.bytes().all(|b| b.is_ascii_digit()) {
            return Verdict::Warning(format!("Invalid operator number: {}", value));
        }

        let len = value.chars().count();
        let too_short = rules.min_length.is_some_and(|min| len < min);
        let too_long = rules.max_length.is_some_and(|max| len > max);
        if too_short || too_long {
            return Verdict::Warning(format!("Invalid operator number: {}", value));
        }

        Verdict::Pass
    }

    /// Check a value and record any failure under `context`
    pub fn evaluate(&mut self, tag: &str, value: &str, context: &str) -> Verdict {
        let verdict = self.check(tag, value);
        match &verdict {
            Verdict::Pass => {}
            Verdict::Warning(message) => {
                debug!("{}: {}", context, message);
                self.warnings
                    .entry(context.to_string())
                    .or_default()
                    .push(message.clone());
            }
            Verdict::Error(message) => {
                debug!("{}: {}", context, message);
                self.errors
                    .entry(context.to_string())
                    .or_default()
                    .push(message.clone());
            }
        }
        verdict
    }

    /// Boolean form of [`Validator::evaluate`]
    pub fn validate(&mut self, tag: &str, value: &str, context: &str) -> bool {
        self.evaluate(tag, value, context).is_pass()
    }

    pub fn summary(&self) -> ValidatorSummary {
        ValidatorSummary {
            error_count: self.errors.values().map(Vec::len).sum(),
            warning_count: self.warnings.values().map(Vec::len).sum(),
            errors_by_context: self.errors.clone(),
            warnings_by_context: self.warnings.clone(),
        }
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn warnings(&self) -> &BTreeMap<String, Vec<String>> {
        &self.warnings
    }

    pub fn reset(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }
}
