//! Pattern-based scrubbing of identifiers in message text.
//!
//! This is a best-effort string substitution heuristic. It is not semantic
//! PHI detection and provides no compliance guarantee: identifiers in other
//! formats pass through untouched. The patterns and their order are policy;
//! changing them needs sign-off rather than a drive-by fix.

use once_cell::sync::Lazy;
use regex::Regex;

pub const SSN_TOKEN: &str = "[REDACTED-SSN]";
pub const ID_TOKEN: &str = "[REDACTED-ID]";
pub const EMAIL_TOKEN: &str = "[REDACTED-EMAIL]";

/// A pattern and the fixed token that replaces every match.
pub struct RedactionRule {
    pub name: &'static str,
    pattern: Regex,
    pub replacement: &'static str,
}

impl RedactionRule {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self {
            name,
            // Patterns are compile-time constants covered by the tests below.
            pattern: Regex::new(pattern).expect("redaction pattern is valid"),
            replacement,
        }
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Applied in this order to every message regardless of role.
static RULES: Lazy<Vec<RedactionRule>> = Lazy::new(|| {
    vec![
        // ASCII digits only; `\d` would also match other Unicode digit scripts.
        RedactionRule::new("ssn", r"[0-9]{3}-[0-9]{2}-[0-9]{4}", SSN_TOKEN),
        RedactionRule::new("numeric_id", r"[0-9]{10,16}", ID_TOKEN),
        RedactionRule::new(
            "email",
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            EMAIL_TOKEN,
        ),
    ]
});

pub fn rules() -> &'static [RedactionRule] {
    &RULES
}

/// Replace every match of every rule, in order.
pub fn redact(content: &str) -> String {
    RULES.iter().fold(content.to_string(), |text, rule| {
        rule.pattern.replace_all(&text, rule.replacement).into_owned()
    })
}
