//! Proto style checks.
//!
//! Static checks over parsed proto files: declarations every file needs, and
//! the naming and layout conventions `opentelemetry-proto` follows.

use serde::{Deserialize, Serialize};

use crate::parser::ProtoFile;

/// Severity level for lint violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational hint.
    Hint,
    /// Warning - may indicate a problem.
    Warning,
    /// Error - fails the style check.
    Error,
}

impl Severity {
    /// Returns the string representation for display.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hint => "hint",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A lint rule applied to proto files.
#[derive(Debug, Clone)]
pub struct LintRule {
    /// Unique identifier for the rule.
    pub id: &'static str,
    /// Description of what the rule checks.
    pub description: &'static str,
    /// Severity of violations.
    pub severity: Severity,
    /// Whether the rule is enabled by default.
    pub enabled_by_default: bool,
}

/// A violation found by a lint rule.
#[derive(Debug, Clone, Serialize)]
pub struct LintViolation {
    /// The rule that was violated.
    pub rule_id: &'static str,
    /// Severity of the violation.
    pub severity: Severity,
    /// File the violation was found in.
    pub file: String,
    /// Human-readable message.
    pub message: String,
    /// Line number (1-based, if applicable).
    pub line: Option<usize>,
}

impl LintViolation {
    fn new(rule: &LintRule, file: &ProtoFile, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id,
            severity: rule.severity,
            file: file.path.clone(),
            message: message.into(),
            line: None,
        }
    }

    const fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/// Rule: every file declares its syntax.
pub const RULE_SYNTAX_DECLARED: LintRule = LintRule {
    id: "style/syntax-declared",
    description: "Files must declare `syntax = \"proto3\";`",
    severity: Severity::Error,
    enabled_by_default: true,
};

/// Rule: every file declares a package.
pub const RULE_PACKAGE_DECLARED: LintRule = LintRule {
    id: "style/package-declared",
    description: "Files must declare a package",
    severity: Severity::Error,
    enabled_by_default: true,
};

/// Rule: the package matches the directory path.
pub const RULE_PACKAGE_DIRECTORY: LintRule = LintRule {
    id: "style/package-directory",
    description: "Package `a.b.v1` must live in directory `a/b/v1/`",
    severity: Severity::Warning,
    enabled_by_default: true,
};

/// Rule: file names are lower snake case.
pub const RULE_FILE_NAMING: LintRule = LintRule {
    id: "style/file-naming",
    description: "File names must be lower_snake_case.proto",
    severity: Severity::Warning,
    enabled_by_default: true,
};

/// Rule: message, enum and service names are Pascal case.
pub const RULE_TYPE_NAMING: LintRule = LintRule {
    id: "style/type-naming",
    description: "Messages, enums and services must be PascalCase",
    severity: Severity::Warning,
    enabled_by_default: true,
};

/// Rule: service names end in `Service`.
pub const RULE_SERVICE_SUFFIX: LintRule = LintRule {
    id: "style/service-suffix",
    description: "Service names should end with `Service`",
    severity: Severity::Hint,
    enabled_by_default: true,
};

/// The default set of lint rules.
pub static DEFAULT_RULES: &[&LintRule] = &[
    &RULE_SYNTAX_DECLARED,
    &RULE_PACKAGE_DECLARED,
    &RULE_PACKAGE_DIRECTORY,
    &RULE_FILE_NAMING,
    &RULE_TYPE_NAMING,
    &RULE_SERVICE_SUFFIX,
];

/// Violations across a set of files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LintReport {
    /// All violations, in file order.
    pub violations: Vec<LintViolation>,
}

impl LintReport {
    /// Returns the number of error-severity violations.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .count()
    }

    /// Returns true if any violation is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

/// A linter for proto files.
#[derive(Debug)]
pub struct Linter {
    enabled_rules: Vec<&'static str>,
}

impl Default for Linter {
    fn default() -> Self {
        Self::new()
    }
}

impl Linter {
    /// Creates a linter with the default rules.
    #[must_use]
    pub fn new() -> Self {
        let enabled_rules = DEFAULT_RULES
            .iter()
            .filter(|r| r.enabled_by_default)
            .map(|r| r.id)
            .collect();
        Self { enabled_rules }
    }

    /// Enables a rule by ID.
    pub fn enable_rule(&mut self, rule_id: &'static str) {
        if !self.enabled_rules.contains(&rule_id) {
            self.enabled_rules.push(rule_id);
        }
    }

    /// Disables a rule by ID.
    pub fn disable_rule(&mut self, rule_id: &str) {
        self.enabled_rules.retain(|&id| id != rule_id);
    }

    /// Checks if a rule is enabled.
    #[must_use]
    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        self.enabled_rules.contains(&rule_id)
    }

    /// Lints every file.
    #[must_use]
    pub fn lint_all(&self, files: &[ProtoFile]) -> LintReport {
        LintReport {
            violations: files.iter().flat_map(|f| self.lint(f)).collect(),
        }
    }

    /// Lints a single file.
    #[must_use]
    pub fn lint(&self, file: &ProtoFile) -> Vec<LintViolation> {
        let mut violations = Vec::new();

        if self.is_rule_enabled(RULE_SYNTAX_DECLARED.id) && file.syntax.is_none() {
            violations.push(LintViolation::new(
                &RULE_SYNTAX_DECLARED,
                file,
                "missing syntax declaration",
            ));
        }

        if self.is_rule_enabled(RULE_PACKAGE_DECLARED.id) && file.package.is_none() {
            violations.push(LintViolation::new(
                &RULE_PACKAGE_DECLARED,
                file,
                "missing package declaration",
            ));
        }

        if self.is_rule_enabled(RULE_PACKAGE_DIRECTORY.id) {
            violations.extend(Self::check_package_directory(file));
        }

        if self.is_rule_enabled(RULE_FILE_NAMING.id) {
            let name = file.path.rsplit('/').next().unwrap_or(&file.path);
            let stem = name.strip_suffix(".proto").unwrap_or(name);
            if !is_lower_snake_case(stem) {
                violations.push(LintViolation::new(
                    &RULE_FILE_NAMING,
                    file,
                    format!("file name '{name}' is not lower_snake_case"),
                ));
            }
        }

        if self.is_rule_enabled(RULE_TYPE_NAMING.id) {
            violations.extend(Self::check_type_naming(file));
        }

        if self.is_rule_enabled(RULE_SERVICE_SUFFIX.id) {
            for service in &file.services {
                if !service.name.ends_with("Service") {
                    violations.push(
                        LintViolation::new(
                            &RULE_SERVICE_SUFFIX,
                            file,
                            format!("service '{}' does not end with 'Service'", service.name),
                        )
                        .at_line(service.line),
                    );
                }
            }
        }

        violations
    }

    fn check_package_directory(file: &ProtoFile) -> Option<LintViolation> {
        let package = file.package.as_deref()?;
        let dir = file.path.rsplit_once('/').map_or("", |(dir, _)| dir);
        let expected = package.replace('.', "/");
        (dir != expected).then(|| {
            LintViolation::new(
                &RULE_PACKAGE_DIRECTORY,
                file,
                format!("package '{package}' should live in '{expected}/', found '{dir}/'"),
            )
        })
    }

    fn check_type_naming(file: &ProtoFile) -> Vec<LintViolation> {
        let declared = file
            .messages
            .iter()
            .map(|m| ("message", m.name.as_str(), m.line))
            .chain(file.enums.iter().map(|e| ("enum", e.name.as_str(), e.line)))
            .chain(
                file.services
                    .iter()
                    .map(|s| ("service", s.name.as_str(), s.line)),
            );

        declared
            .filter_map(|(kind, qualified, line)| {
                let name = qualified.rsplit('.').next().unwrap_or(qualified);
                (!is_pascal_case(name)).then(|| {
                    LintViolation::new(
                        &RULE_TYPE_NAMING,
                        file,
                        format!("{kind} '{qualified}' is not PascalCase"),
                    )
                    .at_line(line)
                })
            })
            .collect()
    }
}

fn is_lower_snake_case(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !s.starts_with('_')
}

fn is_pascal_case(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && s.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str, path: &str) -> ProtoFile {
        ProtoFile::parse_source(source, path).unwrap()
    }

    #[test]
    fn test_clean_file() {
        let file = parse(
            "syntax = \"proto3\";\npackage opentelemetry.proto.logs.v1;\nmessage LogRecord {}\n",
            "opentelemetry/proto/logs/v1/logs.proto",
        );
        assert!(Linter::new().lint(&file).is_empty());
    }

    #[test]
    fn test_missing_declarations_are_errors() {
        let file = parse("message A {}", "a.proto");
        let report = Linter::new().lint_all(&[file]);

        assert_eq!(report.error_count(), 2);
        assert!(report
            .violations
            .iter()
            .any(|v| v.rule_id == "style/syntax-declared"));
    }

    #[test]
    fn test_package_directory_mismatch() {
        let file = parse(
            "syntax = \"proto3\";\npackage opentelemetry.proto.logs.v1;\n",
            "opentelemetry/proto/log/v1/logs.proto",
        );
        let violations = Linter::new().lint(&file);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "style/package-directory");
        assert_eq!(violations[0].severity, Severity::Warning);
    }

    #[test]
    fn test_naming_rules() {
        let file = parse(
            "syntax = \"proto3\";\npackage a;\nmessage bad_name {}\nservice Export {}\n",
            "a/BadFile.proto",
        );
        let violations = Linter::new().lint(&file);
        let ids: Vec<_> = violations.iter().map(|v| v.rule_id).collect();

        assert!(ids.contains(&"style/file-naming"));
        assert!(ids.contains(&"style/type-naming"));
        assert!(ids.contains(&"style/service-suffix"));

        let naming = violations
            .iter()
            .find(|v| v.rule_id == "style/type-naming")
            .unwrap();
        assert_eq!(naming.line, Some(3));
    }

    #[test]
    fn test_disable_rule() {
        let file = parse("message A {}", "a.proto");
        let mut linter = Linter::new();
        linter.disable_rule("style/syntax-declared");
        linter.disable_rule("style/package-declared");

        assert!(!linter.lint_all(&[file]).has_errors());
        linter.enable_rule("style/syntax-declared");
        assert!(linter.is_rule_enabled("style/syntax-declared"));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Hint);
    }
}
