use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{AppError, AppResult};

pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum nesting of where-objects (logical, relation and `not` levels)
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> AppResult<Self> {
        let max_depth = env::var("QUERY_MAX_DEPTH")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_DEPTH);
        Self::default().with_max_depth(max_depth)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> AppResult<Self> {
        if max_depth == 0 {
            return Err(AppError::ConfigurationError(
                "max_depth must be at least 1".to_string(),
            ));
        }
        self.max_depth = max_depth;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_depth() {
        assert_eq!(EngineConfig::default().max_depth, 64);
    }

    #[test]
    fn test_zero_depth_rejected() {
        assert!(EngineConfig::default().with_max_depth(0).is_err());
        assert_eq!(EngineConfig::default().with_max_depth(8).unwrap().max_depth, 8);
    }
}
