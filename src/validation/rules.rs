//! Closed set of validation rules

use std::fmt;

use crate::config::ValidationRules;
use crate::constants::validators::{DISTRICT, FLAG, OPERATOR_NUMBER};

/// What a validator tag checks
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Value must be a key of the named lookup table
    Lookup { table: String },

    /// Value must be one of the configured flag values
    Flag,

    /// Numeric value must fall inside the named range
    Range { name: String },

    /// Operator number format constraints
    OperatorNumber,

    /// Accepted tag with no check behind it yet
    Placeholder,

    /// Tag nothing knows about; every value passes
    Unknown,
}

impl Rule {
    /// Resolve a tag against the configured rules.
    ///
    /// Precedence: lookup validators, flags, named ranges, operator number,
    /// district placeholder.
    pub fn resolve(tag: &str, rules: &ValidationRules) -> Self {
        if let Some(table) = rules.lookup_validators.get(tag) {
            return Rule::Lookup {
                table: table.clone(),
            };
        }
        if tag == FLAG {
            return Rule::Flag;
        }
        if rules.ranges.contains_key(tag) {
            return Rule::Range {
                name: tag.to_string(),
            };
        }
        match tag {
            OPERATOR_NUMBER => Rule::OperatorNumber,
            DISTRICT => Rule::Placeholder,
            _ => Rule::Unknown,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Rule::Lookup { .. } => "lookup",
            Rule::Flag => "flag",
            Rule::Range { .. } => "range",
            Rule::OperatorNumber => "operator_number",
            Rule::Placeholder => "placeholder",
            Rule::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Lookup { table } => write!(f, "lookup({})", table),
            Rule::Range { name } => write!(f, "range({})", name),
            other => f.write_str(other.name()),
        }
    }
}
