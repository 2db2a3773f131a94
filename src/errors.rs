// 🚦 Error Taxonomy - One failure type per HTTP outcome
//
// Missing datasets are NOT errors: the gateway degrades them to empty
// input, so nothing here models them.

use thiserror::Error;

/// Boundary error for the rewards engine and its HTTP surface.
///
/// Four outcomes:
/// - `AuthRequired` → 401, raised before any computation
/// - `PoolExhausted` / `Timeout` → 503, connection released in all paths
/// - `Computation` → 500, internal diagnostic (admin tool, not user-safe)
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request carried no valid token - computation never started
    #[error("authentication required")]
    AuthRequired,

    /// All pooled connections stayed busy past the acquire deadline
    #[error("database pool exhausted: no connection within {waited_ms}ms")]
    PoolExhausted { waited_ms: u64 },

    /// Whole-request wall clock tripped
    #[error("computation timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    /// Unexpected internal failure (bad stored payload, SQL error, ...)
    #[error("computation failed: {0}")]
    Computation(#[from] anyhow::Error),
}

impl EngineError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::AuthRequired => 401,
            EngineError::PoolExhausted { .. } | EngineError::Timeout { .. } => 503,
            EngineError::Computation(_) => 500,
        }
    }

    /// True when the condition is transient and a later retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::PoolExhausted { .. } | EngineError::Timeout { .. }
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(EngineError::AuthRequired.status_code(), 401);
        assert_eq!(
            EngineError::PoolExhausted { waited_ms: 250 }.status_code(),
            503
        );
        assert_eq!(EngineError::Timeout { limit_ms: 5000 }.status_code(), 503);
        assert_eq!(
            EngineError::Computation(anyhow::anyhow!("boom")).status_code(),
            500
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(EngineError::PoolExhausted { waited_ms: 1 }.is_transient());
        assert!(EngineError::Timeout { limit_ms: 1 }.is_transient());
        assert!(!EngineError::AuthRequired.is_transient());
        assert!(!EngineError::Computation(anyhow::anyhow!("boom")).is_transient());
    }

    #[test]
    fn test_distinct_503_messages() {
        // Timeout and exhaustion share a status but must stay tellable apart
        let pool = EngineError::PoolExhausted { waited_ms: 250 }.to_string();
        let timeout = EngineError::Timeout { limit_ms: 5000 }.to_string();
        assert!(pool.contains("pool exhausted"));
        assert!(timeout.contains("timed out"));
        assert_ne!(pool, timeout);
    }
}
