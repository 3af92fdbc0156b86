//! Domain errors for the run authorization module.

use run_authz_sdk::RunAuthzError;

/// Internal domain errors.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    /// A resolution failure; passed through unchanged.
    #[error(transparent)]
    Authz(#[from] RunAuthzError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for RunAuthzError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Authz(inner) => inner,
            DomainError::InvalidConfig(reason) => {
                Self::Internal(format!("invalid configuration: {reason}"))
            }
            DomainError::Internal(reason) => Self::Internal(reason),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn resolution_errors_pass_through() {
        let back: RunAuthzError = DomainError::from(RunAuthzError::Canceled).into();
        assert_eq!(back, RunAuthzError::Canceled);
    }

    #[test]
    fn wiring_faults_become_internal() {
        let back: RunAuthzError = DomainError::InvalidConfig("empty catalog".to_owned()).into();
        assert!(matches!(back, RunAuthzError::Internal(msg) if msg.contains("empty catalog")));
    }
}
