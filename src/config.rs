//! Run configuration.
//!
//! [`RunConfig`] is the plain-data half of a run: how many items and how
//! many slots. It can be built in code, parsed from JSON, or converted from
//! signed input such as command line arguments. [`RunSpec`] pairs a config
//! with the work to execute.

use serde::{Deserialize, Serialize};

use crate::error::RunnerError;

/// Immutable configuration for one run.
///
/// # Example
///
/// ```
/// use bounded_runner::RunConfig;
///
/// let config = RunConfig::new(20, 5);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.effective_concurrency(), 5);
///
/// // More slots than items just means every item starts at once.
/// assert_eq!(RunConfig::new(3, 5).effective_concurrency(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SignedRunConfig")]
pub struct RunConfig {
    /// Total number of items to execute.
    pub total_runs: usize,
    /// Maximum number of items in flight at once.
    pub concurrency: usize,
}

/// Wire form accepting signed numbers so negative values are rejected with
/// a configuration error instead of a type error.
#[derive(Deserialize)]
struct SignedRunConfig {
    total_runs: i64,
    concurrency: i64,
}

impl TryFrom<SignedRunConfig> for RunConfig {
    type Error = RunnerError;

    fn try_from(raw: SignedRunConfig) -> Result<Self, Self::Error> {
        Self::from_signed(raw.total_runs, raw.concurrency)
    }
}

impl RunConfig {
    /// Creates a new RunConfig. Call [`validate`](Self::validate) or let the
    /// runner do it before dispatch.
    pub fn new(total_runs: usize, concurrency: usize) -> Self {
        Self {
            total_runs,
            concurrency,
        }
    }

    /// Builds a validated config from signed values.
    ///
    /// A negative `total_runs` and a `concurrency` below 1 are both
    /// configuration errors.
    pub fn from_signed(total_runs: i64, concurrency: i64) -> Result<Self, RunnerError> {
        if total_runs < 0 {
            return Err(RunnerError::configuration(format!(
                "total_runs must be non-negative, got {}",
                total_runs
            )));
        }
        if concurrency < 1 {
            return Err(RunnerError::configuration(format!(
                "concurrency must be at least 1, got {}",
                concurrency
            )));
        }
        let total_runs = usize::try_from(total_runs).map_err(|_| {
            RunnerError::configuration(format!("total_runs {} does not fit in usize", total_runs))
        })?;
        let concurrency = usize::try_from(concurrency).map_err(|_| {
            RunnerError::configuration(format!(
                "concurrency {} does not fit in usize",
                concurrency
            ))
        })?;
        Ok(Self::new(total_runs, concurrency))
    }

    /// Parses and validates a config from JSON.
    ///
    /// ```
    /// use bounded_runner::RunConfig;
    ///
    /// let config = RunConfig::from_json(r#"{"total_runs": 20, "concurrency": 5}"#).unwrap();
    /// assert_eq!(config, RunConfig::new(20, 5));
    ///
    /// assert!(RunConfig::from_json(r#"{"total_runs": 20, "concurrency": -1}"#).is_err());
    /// ```
    pub fn from_json(json: &str) -> Result<Self, RunnerError> {
        serde_json::from_str(json).map_err(|e| RunnerError::configuration(e.to_string()))
    }

    /// Checks the config before any dispatch.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.concurrency == 0 {
            return Err(RunnerError::configuration(
                "concurrency must be at least 1, got 0",
            ));
        }
        Ok(())
    }

    /// The number of slots that can actually be occupied.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.min(self.total_runs)
    }
}

/// Configuration plus the work to run.
pub struct RunSpec<W> {
    /// Item count and concurrency limit
    pub config: RunConfig,
    /// The work invoked once per item index
    pub work: W,
}

impl<W> RunSpec<W> {
    /// Creates a new RunSpec.
    pub fn new(total_runs: usize, concurrency: usize, work: W) -> Self {
        Self {
            config: RunConfig::new(total_runs, concurrency),
            work,
        }
    }

    /// Creates a RunSpec from an existing config.
    pub fn with_config(config: RunConfig, work: W) -> Self {
        Self { config, work }
    }
}

impl<W> std::fmt::Debug for RunSpec<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSpec")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let error = RunConfig::new(10, 0).validate().unwrap_err();
        assert!(error.is_configuration());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency_with_no_items() {
        assert!(RunConfig::new(0, 0).validate().is_err());
    }

    #[test]
    fn test_validate_accepts_empty_run() {
        assert!(RunConfig::new(0, 5).validate().is_ok());
    }

    #[test]
    fn test_effective_concurrency() {
        assert_eq!(RunConfig::new(20, 5).effective_concurrency(), 5);
        assert_eq!(RunConfig::new(3, 5).effective_concurrency(), 3);
        assert_eq!(RunConfig::new(0, 5).effective_concurrency(), 0);
    }

    #[test]
    fn test_from_signed() {
        assert_eq!(RunConfig::from_signed(20, 5).unwrap(), RunConfig::new(20, 5));
        assert!(RunConfig::from_signed(20, 0).unwrap_err().is_configuration());
        assert!(RunConfig::from_signed(20, -1).unwrap_err().is_configuration());
        assert!(RunConfig::from_signed(-1, 5).unwrap_err().is_configuration());
    }

    #[test]
    fn test_from_json() {
        let config = RunConfig::from_json(r#"{"total_runs": 3, "concurrency": 5}"#).unwrap();
        assert_eq!(config, RunConfig::new(3, 5));
    }

    #[test]
    fn test_from_json_rejects_negative_and_missing() {
        assert!(RunConfig::from_json(r#"{"total_runs": -4, "concurrency": 5}"#).is_err());
        assert!(RunConfig::from_json(r#"{"total_runs": 4, "concurrency": 0}"#).is_err());
        assert!(RunConfig::from_json(r#"{"total_runs": 4}"#).is_err());
    }

    #[test]
    fn test_serialize_round_trip_shape() {
        let json = serde_json::to_value(RunConfig::new(20, 5)).unwrap();
        assert_eq!(json, serde_json::json!({"total_runs": 20, "concurrency": 5}));
    }
}
