//! Configuration errors that tell the operator how to fix them.

/// A configuration problem detected at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A value is malformed or out of range.
    #[error("Invalid configuration: {message}\n\nHow to fix: {fix_hint}")]
    Invalid { message: String, fix_hint: String },

    /// Two settings that cannot be combined.
    #[error("Incompatible settings: {first} cannot be used with {second}\n\nReason: {reason}")]
    Incompatible {
        first: String,
        second: String,
        reason: String,
    },

    /// A setting is needed because another one is present.
    #[error("Missing required configuration: {setting}\n\nRequired for: {context}\nSet via: {env_var}")]
    MissingRequired {
        setting: String,
        context: String,
        env_var: String,
    },

    /// Several problems at once.
    #[error("{}", render_multiple(.0))]
    Multiple(Vec<ConfigurationError>),
}

fn render_multiple(errors: &[ConfigurationError]) -> String {
    let mut out = String::from("Multiple configuration errors:\n");
    for (i, err) in errors.iter().enumerate() {
        out.push_str(&format!("\n{}. {err}\n", i + 1));
    }
    out
}

impl ConfigurationError {
    #[must_use]
    pub fn invalid(message: impl Into<String>, fix_hint: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            fix_hint: fix_hint.into(),
        }
    }

    #[must_use]
    pub fn incompatible(
        first: impl Into<String>,
        second: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Incompatible {
            first: first.into(),
            second: second.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn missing_required(
        setting: impl Into<String>,
        context: impl Into<String>,
        env_var: impl Into<String>,
    ) -> Self {
        Self::MissingRequired {
            setting: setting.into(),
            context: context.into(),
            env_var: env_var.into(),
        }
    }

    /// Collapse a list of errors: `None` when empty, the error itself when
    /// there is one, `Multiple` otherwise.
    #[must_use]
    pub fn collect(mut errors: Vec<ConfigurationError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// Number of individual problems.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Multiple(errors) => errors.len(),
            _ => 1,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_display_has_fix_hint() {
        let err = ConfigurationError::invalid(
            "results.timeout_secs is 0",
            "Set SEARCHLIGHT__RESULTS__TIMEOUT_SECS to a positive number",
        );
        let msg = err.to_string();
        assert!(msg.contains("Invalid configuration"));
        assert!(msg.contains("How to fix"));
    }

    #[test]
    fn test_missing_required_display() {
        let err = ConfigurationError::missing_required(
            "datastore anon key",
            "DATASTORE_URL is set",
            "DATASTORE_ANON_KEY",
        );
        let msg = err.to_string();
        assert!(msg.contains("Missing required"));
        assert!(msg.contains("DATASTORE_ANON_KEY"));
    }

    #[test]
    fn test_collect() {
        assert!(ConfigurationError::collect(vec![]).is_none());

        let one = ConfigurationError::collect(vec![ConfigurationError::invalid("a", "b")]).unwrap();
        assert_eq!(one.count(), 1);

        let many = ConfigurationError::collect(vec![
            ConfigurationError::invalid("first", "x"),
            ConfigurationError::incompatible("A", "B", "because"),
        ])
        .unwrap();
        assert_eq!(many.count(), 2);
        let msg = many.to_string();
        assert!(msg.contains("1. Invalid configuration: first"));
        assert!(msg.contains("2. Incompatible settings"));
    }
}
