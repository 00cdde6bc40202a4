//! Pattern-based content checks at the input and output boundaries of the loop.

use crate::interfaces::RuntimeError;
use crate::types::Message;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one guardrail evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailVerdict {
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GuardrailVerdict {
    pub fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone)]
struct PatternRule {
    category: String,
    pattern: Regex,
}

const SENSITIVE_DATA: &str = "sensitive_data";
const ABUSIVE_CONTENT: &str = "abusive_content";
const INTERNAL_IDENTIFIER: &str = "internal_identifier";
const CREDENTIAL_TOKEN: &str = "credential_token";

const DEFAULT_INPUT_PATTERNS: &[(&str, &str)] = &[
    (SENSITIVE_DATA, r"(?i)\bpass(word|code|wd)\s*(is|:|=)\s*\S+"),
    (SENSITIVE_DATA, r"\b\d{3}-\d{2}-\d{4}\b"),
    (SENSITIVE_DATA, r"\b(?:\d[ -]?){13,16}\b"),
    (SENSITIVE_DATA, r"(?i)\b(api[_-]?key|secret[_-]?key|access[_-]?token)\s*(is|:|=)\s*\S+"),
    (ABUSIVE_CONTENT, r"(?i)\bkill\s+yourself\b"),
    (ABUSIVE_CONTENT, r"(?i)\bi\s+(will|am going to|'m going to)\s+(hurt|kill|find)\s+you\b"),
    (ABUSIVE_CONTENT, r"(?i)\b(worthless|useless)\s+(piece of|waste of)\b"),
];

const DEFAULT_OUTPUT_PATTERNS: &[(&str, &str)] = &[
    (INTERNAL_IDENTIFIER, r"(?i)\binternal[_ -]?(id|only|use)\b"),
    (INTERNAL_IDENTIFIER, r"\b(tal|usr|ses)_[A-Za-z0-9]{16,}\b"),
    (CREDENTIAL_TOKEN, r"\bsk-[A-Za-z0-9_-]{20,}"),
    (CREDENTIAL_TOKEN, r"\bAKIA[0-9A-Z]{16}\b"),
    (CREDENTIAL_TOKEN, r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]{20,}"),
    (CREDENTIAL_TOKEN, r"-----BEGIN [A-Z ]*PRIVATE KEY-----"),
];

fn compile(patterns: &[(&str, &str)]) -> Vec<PatternRule> {
    patterns
        .iter()
        .filter_map(|(category, pattern)| {
            Regex::new(pattern).ok().map(|pattern| PatternRule {
                category: category.to_string(),
                pattern,
            })
        })
        .collect()
}

/// Stateless classifier. Rules are checked in insertion order and the first
/// match decides the reason, so identical content always yields an identical
/// verdict.
#[derive(Debug, Clone)]
pub struct GuardrailEvaluator {
    input_rules: Vec<PatternRule>,
    output_rules: Vec<PatternRule>,
}

impl GuardrailEvaluator {
    pub fn new() -> Self {
        Self {
            input_rules: compile(DEFAULT_INPUT_PATTERNS),
            output_rules: compile(DEFAULT_OUTPUT_PATTERNS),
        }
    }

    /// Add a disallowed-input pattern under `category`.
    pub fn with_input_pattern(mut self, category: &str, pattern: &str) -> Result<Self, RuntimeError> {
        self.input_rules.push(Self::rule(category, pattern)?);
        Ok(self)
    }

    /// Add a leakage marker checked against produced answers.
    pub fn with_output_pattern(mut self, category: &str, pattern: &str) -> Result<Self, RuntimeError> {
        self.output_rules.push(Self::rule(category, pattern)?);
        Ok(self)
    }

    fn rule(category: &str, pattern: &str) -> Result<PatternRule, RuntimeError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| RuntimeError::ConfigError(format!("Invalid guardrail pattern: {}", e)))?;
        Ok(PatternRule {
            category: category.to_string(),
            pattern,
        })
    }

    /// Check the textual content of a whole message batch.
    pub fn evaluate_input(&self, batch: &[Message]) -> GuardrailVerdict {
        let text = batch
            .iter()
            .map(Message::text)
            .collect::<Vec<_>>()
            .join("\n");

        match Self::first_match(&self.input_rules, &text) {
            Some(category) => GuardrailVerdict::fail(format!(
                "{}: input contains disallowed content",
                category
            )),
            None => GuardrailVerdict::pass(),
        }
    }

    /// Check a produced answer for emptiness and leakage.
    pub fn evaluate_output(&self, answer: &Value) -> GuardrailVerdict {
        let empty = match answer {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(fields) => fields.is_empty(),
            _ => false,
        };
        if empty {
            return GuardrailVerdict::fail("empty_answer: the agent produced no answer");
        }

        let serialized = match answer {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match Self::first_match(&self.output_rules, &serialized) {
            Some(category) => GuardrailVerdict::fail(format!(
                "{}: answer leaks protected data",
                category
            )),
            None => GuardrailVerdict::pass(),
        }
    }

    fn first_match<'a>(rules: &'a [PatternRule], text: &str) -> Option<&'a str> {
        rules
            .iter()
            .find(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.category.as_str())
    }
}

impl Default for GuardrailEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
