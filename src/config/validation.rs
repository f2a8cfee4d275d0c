//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, probabilities within [0, 1])
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ReliableSessionConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ReliableSessionConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a parsed configuration, reporting every violation found.
pub fn validate_config(config: &ReliableSessionConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.requestor.iteration_ms == 0 {
        errors.push(ValidationError::new("requestor.iteration_ms", "must be greater than zero"));
    }
    if config.requestor.receive_ms == 0 {
        errors.push(ValidationError::new("requestor.receive_ms", "must be greater than zero"));
    }
    if config.guard.max_in_flight == 0 {
        errors.push(ValidationError::new("guard.max_in_flight", "must admit at least one operation"));
    }
    if config.faults.send_timeout_ms == 0 {
        errors.push(ValidationError::new("faults.send_timeout_ms", "must be greater than zero"));
    }
    if config.faults.close_timeout_ms == 0 {
        errors.push(ValidationError::new("faults.close_timeout_ms", "must be greater than zero"));
    }
    if !(0.0..=1.0).contains(&config.simulation.drop_rate) {
        errors.push(ValidationError::new(
            "simulation.drop_rate",
            format!("{} is outside [0, 1]", config.simulation.drop_rate),
        ));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ReliableSessionConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_violation() {
        let mut config = ReliableSessionConfig::default();
        config.requestor.iteration_ms = 0;
        config.guard.max_in_flight = 0;
        config.simulation.drop_rate = 1.5;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "requestor.iteration_ms",
                "guard.max_in_flight",
                "simulation.drop_rate",
                "observability.log_level"
            ]
        );
    }
}
