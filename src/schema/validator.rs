//! Column validation groups
//!
//! A column's validity check is an OR-group: a value is valid when it matches
//! at least one declared format, and an absent value is valid unless the
//! column is required.

use serde_json::Value;

use super::format::{Format, FormatKind};

/// A single validation rule
#[derive(Debug, Clone)]
pub enum Rule {
    /// Accepts an absent value
    Undefined,
    /// Accepts a present value matching the format
    Format(Format),
}

impl Rule {
    /// Checks a possibly absent value
    pub fn validate(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (Rule::Undefined, None) => true,
            (Rule::Format(format), Some(value)) => format.validate(value),
            _ => false,
        }
    }
}

/// OR-combined validation rules of a column
#[derive(Debug, Clone, Default)]
pub struct Validation {
    rules: Vec<Rule>,
}

impl Validation {
    /// Creates an empty group that accepts nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a format; the first format also installs the undefined acceptor
    /// unless the column is already required.
    pub fn add_format(&mut self, format: Format, required: bool) {
        if self.rules.is_empty() && !required {
            self.rules.push(Rule::Undefined);
        }
        self.rules.push(Rule::Format(format));
    }

    /// Removes the undefined acceptor
    pub fn require(&mut self) {
        self.rules.retain(|rule| !matches!(rule, Rule::Undefined));
    }

    /// Returns true if any format was declared
    pub fn is_declared(&self) -> bool {
        self.rules.iter().any(|rule| matches!(rule, Rule::Format(_)))
    }

    /// Returns true if an absent value passes
    pub fn accepts_undefined(&self) -> bool {
        self.rules.iter().any(|rule| matches!(rule, Rule::Undefined))
    }

    /// Checks a possibly absent value against every rule (OR semantics)
    pub fn validate(&self, value: Option<&Value>) -> bool {
        self.rules.iter().any(|rule| rule.validate(value))
    }

    /// Declared formats in declaration order
    pub fn formats(&self) -> impl Iterator<Item = &Format> {
        self.rules.iter().filter_map(|rule| match rule {
            Rule::Format(format) => Some(format),
            Rule::Undefined => None,
        })
    }

    /// Returns true if a format of the given kind is declared
    pub fn has(&self, kind: FormatKind) -> bool {
        self.formats().any(|format| format.kind() == kind)
    }

    /// Human-readable summary, e.g. "string | null"
    pub fn describe(&self) -> String {
        let names: Vec<&str> = self.formats().map(|f| f.kind().as_str()).collect();
        if names.is_empty() {
            "nothing".to_string()
        } else {
            names.join(" | ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn string() -> Format {
        Format::String {
            min: None,
            max: None,
        }
    }

    #[test]
    fn test_or_semantics() {
        let mut validation = Validation::new();
        validation.add_format(string(), false);
        validation.add_format(Format::Null, false);

        assert!(validation.validate(Some(&json!("x"))));
        assert!(validation.validate(Some(&json!(null))));
        assert!(!validation.validate(Some(&json!(42))));
    }

    #[test]
    fn test_undefined_accepted_until_required() {
        let mut validation = Validation::new();
        validation.add_format(string(), false);
        assert!(validation.validate(None));

        validation.require();
        assert!(!validation.validate(None));
        assert!(validation.validate(Some(&json!("x"))));
    }

    #[test]
    fn test_required_before_first_format() {
        let mut validation = Validation::new();
        validation.add_format(string(), true);
        assert!(!validation.accepts_undefined());
    }

    #[test]
    fn test_describe() {
        let mut validation = Validation::new();
        validation.add_format(string(), false);
        validation.add_format(Format::Null, false);
        assert_eq!(validation.describe(), "string | null");
        assert!(validation.has(FormatKind::Null));
        assert!(!validation.has(FormatKind::Integer));
    }
}
