// Definition error types with helpful error messages
// Provides context, line/column info, and suggestions for common mistakes

use std::fmt;

/// Detailed definition error with location and context
#[derive(Debug, Clone)]
pub struct DefinitionError {
    /// Error message
    pub message: String,
    /// Line number (1-indexed, 0 when unknown)
    pub line: usize,
    /// Column number (1-indexed, 0 when unknown)
    pub column: usize,
    /// Surrounding context (a few lines around the error)
    pub context: String,
    /// Optional suggestion for fixing the error
    pub suggestion: Option<String>,
    /// The kind of error
    pub kind: DefinitionErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionErrorKind {
    /// YAML syntax error
    YamlSyntax,
    /// Invalid structure (wrong types, missing fields)
    InvalidSchema,
    /// IO error (file not found, etc.)
    IoError,
    /// Semantic error (unknown upstream, duplicate dataset)
    ValidationError,
}

impl DefinitionError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            context: String::new(),
            suggestion: None,
            kind: DefinitionErrorKind::InvalidSchema,
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(message, 0, 0).with_kind(DefinitionErrorKind::IoError)
    }

    /// Summarize semantic validation failures as one error
    pub fn validation(errors: &[ValidationError]) -> Self {
        let message = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Self::new(message, 0, 0).with_kind(DefinitionErrorKind::ValidationError)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Whether the error came from reading the file rather than its content
    pub fn is_io(&self) -> bool {
        self.kind == DefinitionErrorKind::IoError
    }

    pub fn with_kind(mut self, kind: DefinitionErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Create context from source content
    pub fn with_source_context(mut self, source: &str, context_lines: usize) -> Self {
        let lines: Vec<&str> = source.lines().collect();
        let start = self.line.saturating_sub(context_lines + 1);
        let end = (self.line + context_lines).min(lines.len());

        let mut context = String::new();
        for (i, line) in lines.iter().enumerate().take(end).skip(start) {
            let line_num = i + 1;
            let prefix = if line_num == self.line { ">" } else { " " };
            context.push_str(&format!("{} {:4} | {}\n", prefix, line_num, line));

            if line_num == self.line && self.column > 0 {
                let indicator = " ".repeat(self.column + 7) + "^";
                context.push_str(&format!("       | {}\n", indicator));
            }
        }

        self.context = context;
        self
    }

    /// Create from serde_yaml error
    pub fn from_yaml_error(err: &serde_yaml::Error, source: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));

        let message = format_yaml_error_message(err);
        let suggestion = suggest_yaml_fix(err, source, line);

        let kind = if message.starts_with("missing")
            || message.starts_with("unknown")
            || message.starts_with("expected")
        {
            DefinitionErrorKind::InvalidSchema
        } else {
            DefinitionErrorKind::YamlSyntax
        };

        let mut error = DefinitionError::new(message, line, column)
            .with_kind(kind)
            .with_source_context(source, 2);
        error.suggestion = suggestion;
        error
    }
}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;
        if self.line > 0 {
            writeln!(f, "  --> line {}:{}", self.line, self.column)?;
        }

        if !self.context.is_empty() {
            writeln!(f)?;
            write!(f, "{}", self.context)?;
        }

        if let Some(suggestion) = &self.suggestion {
            writeln!(f)?;
            writeln!(f, "help: {}", suggestion)?;
        }

        Ok(())
    }
}

impl std::error::Error for DefinitionError {}

/// Format serde_yaml error message into something more readable
fn format_yaml_error_message(err: &serde_yaml::Error) -> String {
    let msg = err.to_string();

    if msg.contains("missing field") {
        if let Some(field) = extract_between(&msg, "missing field `", "`") {
            return format!("missing required field '{}'", field);
        }
    }

    if msg.contains("unknown field") {
        if let Some(field) = extract_between(&msg, "unknown field `", "`") {
            if let Some(expected) = extract_expected(&msg) {
                return format!(
                    "unknown field '{}', expected one of: {}",
                    field,
                    expected.join(", ")
                );
            }
            return format!("unknown field '{}'", field);
        }
    }

    if msg.contains("unknown variant") {
        if let Some(variant) = extract_between(&msg, "unknown variant `", "`") {
            if let Some(expected) = extract_expected(&msg) {
                return format!(
                    "unknown value '{}', expected one of: {}",
                    variant,
                    expected.join(", ")
                );
            }
            return format!("unknown value '{}'", variant);
        }
    }

    if msg.contains("invalid type") {
        if let (Some(expected), Some(found)) = (
            extract_between(&msg, "expected ", " at"),
            extract_between(&msg, "invalid type: ", ","),
        ) {
            return format!("expected {}, but found {}", expected, found);
        }
    }

    msg
}

fn extract_between(msg: &str, prefix: &str, suffix: &str) -> Option<String> {
    let start = msg.find(prefix)? + prefix.len();
    let end = msg[start..].find(suffix)? + start;
    Some(msg[start..end].to_string())
}

fn extract_expected(msg: &str) -> Option<Vec<String>> {
    let start = msg.find("expected one of ")? + "expected one of ".len();
    let rest = &msg[start..];
    let end = rest.find(" at").unwrap_or(rest.len());
    Some(
        rest[..end]
            .split(", ")
            .map(|s| s.trim_matches('`').to_string())
            .collect(),
    )
}

/// Suggest fixes for common definition mistakes
fn suggest_yaml_fix(err: &serde_yaml::Error, source: &str, line: usize) -> Option<String> {
    let msg = err.to_string();
    let lines: Vec<&str> = source.lines().collect();
    let error_line = lines.get(line.saturating_sub(1)).unwrap_or(&"");

    if msg.contains("missing field `tier`") {
        return Some(
            "every dataset needs a tier: raw, conformed, aggregated or derived".to_string(),
        );
    }

    if msg.contains("missing field `kind`") {
        return Some(
            "transforms need a kind: passthrough, select, filter, aggregate, join, risk_level or chain"
                .to_string(),
        );
    }

    if msg.contains("unknown variant") && error_line.contains("mode:") {
        return Some("mode must be 'append' or 'recompute'".to_string());
    }

    if error_line.starts_with('\t') {
        return Some(
            "YAML prefers spaces over tabs for indentation. Replace tabs with spaces.".to_string(),
        );
    }

    let typo_suggestions = [
        ("upstream:", "upstreams"),
        ("depends_on", "upstreams"),
        ("dependson", "upstreams"),
        ("groupby", "group_by"),
        ("group-by", "group_by"),
        ("layer:", "tier"),
    ];

    let lower_line = error_line.to_lowercase();
    for (typo, correct) in typo_suggestions {
        if lower_line.contains(typo) {
            return Some(format!("did you mean '{}'?", correct));
        }
    }

    None
}

/// Result type for definition parsing
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Semantic problem found while validating a definition
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
    pub path: String,
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error at '{}': {}", self.path, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_error_display() {
        let err = DefinitionError::new("missing required field 'tier'", 4, 5)
            .with_suggestion("every dataset needs a tier");

        let output = format!("{}", err);
        assert!(output.contains("missing required field"));
        assert!(output.contains("line 4:5"));
        assert!(output.contains("help:"));
    }

    #[test]
    fn test_source_context_marks_line() {
        let source = "name: demo\ndatasets:\n  - name: raw\n    tier: bronze\n";
        let err = DefinitionError::new("unknown value 'bronze'", 4, 11).with_source_context(source, 1);

        assert!(err.context.contains(">    4 |     tier: bronze"));
        assert!(err.context.contains("^"));
    }

    #[test]
    fn test_io_error_has_no_location() {
        let output = DefinitionError::io("failed to read file: missing.yaml").to_string();
        assert!(!output.contains("-->"));
    }

    #[test]
    fn test_extract_between() {
        let msg = "datasets[0]: missing field `tier` at line 3 column 5";
        assert_eq!(
            extract_between(msg, "missing field `", "`"),
            Some("tier".to_string())
        );
    }
}
