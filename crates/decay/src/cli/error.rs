//! Helpful error types for the command line
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Config file given with --config does not exist
    pub fn config_not_found(path: &Path) -> Self {
        Self::new(format!("Config file not found: {}", path.display()))
            .with_context("The file passed to --config does not exist")
            .with_suggestions([
                format!("TRY: Check that the file exists: ls -la {}", path.display()),
                "TRY: Omit --config to read ./decay.yml when present".to_string(),
            ])
    }

    /// Config file exists but is not valid YAML for decay
    pub fn config_invalid(path: &Path, details: &str) -> Self {
        Self::new(format!("Invalid config file: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: Keys use snake_case, e.g. stale_age_in_days, ignore_paths".to_string(),
                "TRY: Backend settings go under a 'github:' or 'confluence:' section".to_string(),
            ])
    }

    /// A source could not be reached at all
    pub fn source_unreachable(source: &str, details: &str) -> Self {
        Self::new(format!("Cannot connect to {}", source))
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: Check the host name and your network connection".to_string(),
                "TRY: Verify the access token or password has read access".to_string(),
            ])
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While reading decay.yml")
            .with_suggestion("Try again");

        let display = format!("{}", err);
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While reading decay.yml"));
        assert!(display.contains("  Try again"));
    }

    #[test]
    fn test_config_not_found() {
        let err = HelpfulError::config_not_found(&PathBuf::from("/nope/decay.yml"));
        assert!(err.message.contains("/nope/decay.yml"));
        assert_eq!(err.suggestions.len(), 2);
    }
}
