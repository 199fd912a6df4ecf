//! Configuration validation.
//!
//! Checks the parsed config against the capability catalog the caller knows
//! about, detects unknown or misspelled keys in the raw document, and flags
//! settings that cannot work.

use crate::schema::PjmanConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "unknown-field", "unknown-capability", "value"
    pub category: &'static str,
    /// Dotted path, e.g. "options.timeout"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}: {}", self.severity, self.category, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        });
    }
}

const TOP_LEVEL_KEYS: &[&str] = &["sandbox", "options", "ports", "dependencies"];
const OPTIONS_KEYS: &[&str] = &["timeout", "displayErrors"];
const PORTS_KEYS: &[&str] = &["static", "ws"];

/// Validate a parsed config.
///
/// `known_capabilities` is the host capability catalog; enabling anything
/// outside it is an error because plugin loading would fail at startup.
pub fn validate(config: &PjmanConfig, known_capabilities: &[&str]) -> ValidationResult {
    let mut result = ValidationResult::default();

    for name in config.enabled_capabilities() {
        if known_capabilities.contains(&name) {
            continue;
        }
        let hint = suggest(name, known_capabilities, 2)
            .map(|s| format!(" (did you mean \"{s}\"?)"))
            .unwrap_or_default();
        result.push(
            Severity::Error,
            "unknown-capability",
            format!("sandbox.{name}"),
            format!("no host capability named \"{name}\"{hint}"),
        );
    }

    if config.options.timeout == Some(0) {
        result.push(
            Severity::Error,
            "value",
            "options.timeout",
            "a zero timeout fails every plugin load; use null to disable the limit",
        );
    }

    if config.ports.static_files == config.ports.ws {
        result.push(
            Severity::Warning,
            "value",
            "ports",
            format!(
                "static and ws ports are both {}; the transports cannot share a port",
                config.ports.ws
            ),
        );
    }

    result
}

/// Detect unknown keys in a raw config document (already parsed to JSON).
pub fn check_unknown_fields(raw: &serde_json::Value) -> ValidationResult {
    let mut result = ValidationResult::default();
    let Some(root) = raw.as_object() else {
        result.push(Severity::Error, "value", "", "config root must be an object");
        return result;
    };

    let sections: [(&str, &[&str]); 2] = [("options", OPTIONS_KEYS), ("ports", PORTS_KEYS)];
    for (key, value) in root {
        if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
            push_unknown(&mut result, "", key, TOP_LEVEL_KEYS);
            continue;
        }
        let Some((_, known)) = sections.iter().find(|(name, _)| name == key) else {
            continue;
        };
        if let Some(section) = value.as_object() {
            for inner in section.keys() {
                if !known.contains(&inner.as_str()) {
                    push_unknown(&mut result, key, inner, known);
                }
            }
        }
    }

    result
}

fn push_unknown(result: &mut ValidationResult, parent: &str, key: &str, known: &[&str]) {
    let path = if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    };
    let message = match suggest(key, known, 3) {
        Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
        None => "unknown field".to_string(),
    };
    result.push(Severity::Warning, "unknown-field", path, message);
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut row = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            row[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(row[j] + 1);
        }
        prev = row;
    }
    prev[b.len()]
}

fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &[&str] = &["console", "fs", "path", "process"];

    #[test]
    fn default_config_is_clean() {
        let result = validate(&PjmanConfig::default(), CATALOG);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn unknown_capability_is_an_error_with_hint() {
        let mut config = PjmanConfig::default();
        config.sandbox.insert("consol".into(), true);
        let result = validate(&config, CATALOG);
        assert!(result.has_errors());
        let diag = &result.diagnostics[0];
        assert_eq!(diag.path, "sandbox.consol");
        assert!(diag.message.contains("did you mean \"console\""));
    }

    #[test]
    fn disabled_unknown_capability_is_ignored() {
        let mut config = PjmanConfig::default();
        config.sandbox.insert("net".into(), false);
        assert!(!validate(&config, CATALOG).has_errors());
    }

    #[test]
    fn zero_timeout_and_shared_ports_are_reported() {
        let mut config = PjmanConfig::default();
        config.options.timeout = Some(0);
        config.ports.ws = config.ports.static_files;
        let result = validate(&config, CATALOG);
        assert_eq!(result.count(Severity::Error), 1);
        assert_eq!(result.count(Severity::Warning), 1);
    }

    #[test]
    fn unknown_fields_are_flagged() {
        let raw = serde_json::json!({
            "sandbox": {},
            "option": {},
            "options": { "timeot": 5 },
        });
        let result = check_unknown_fields(&raw);
        let paths: Vec<_> = result.diagnostics.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, ["option", "options.timeot"]);
        assert!(result.diagnostics[0].message.contains("\"options\""));
        assert!(result.diagnostics[1].message.contains("\"timeout\""));
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("fs", "fs"), 0);
    }
}
