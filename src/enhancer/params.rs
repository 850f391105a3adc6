//! Caller-facing enhancement parameters

use serde::{Deserialize, Serialize};

use crate::error::{EnhanceError, Result};
use crate::neural::{EnhanceConfig, Solver, MAX_NFE};

/// Raw enhancement parameters as supplied by a caller.
///
/// Unlike [`EnhanceConfig`] these are unchecked; [`EnhanceParams::validate`]
/// turns them into a config or reports the first offending field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceParams {
    pub nfe: u32,
    pub solver: String,
    pub lambd: f32,
    pub tau: f32,
}

impl Default for EnhanceParams {
    fn default() -> Self {
        Self {
            nfe: 32,
            solver: Solver::Midpoint.as_str().to_string(),
            lambd: 0.5,
            tau: 0.5,
        }
    }
}

impl EnhanceParams {
    pub fn new(nfe: u32, solver: impl Into<String>, lambd: f32, tau: f32) -> Self {
        Self {
            nfe,
            solver: solver.into(),
            lambd,
            tau,
        }
    }

    /// Check every field against its legal domain.
    ///
    /// Order: nfe, solver, lambd, tau.
    pub fn validate(&self) -> Result<EnhanceConfig> {
        if self.nfe == 0 || self.nfe > MAX_NFE {
            return Err(EnhanceError::invalid_param(
                "nfe",
                self.nfe,
                "integer in (0, 128]",
            ));
        }
        let solver: Solver = self.solver.parse()?;
        EnhanceConfig::new(self.nfe, solver, self.lambd, self.tau)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults_validate() {
        let config = EnhanceParams::default().validate().unwrap();
        assert_eq!(config, EnhanceConfig::default());
    }

    #[test_case(EnhanceParams::new(0, "midpoint", 0.5, 0.5), "nfe"; "nfe zero")]
    #[test_case(EnhanceParams::new(129, "midpoint", 0.5, 0.5), "nfe"; "nfe too large")]
    #[test_case(EnhanceParams::new(32, "foo", 0.5, 0.5), "solver"; "unknown solver")]
    #[test_case(EnhanceParams::new(32, "midpoint", -0.1, 0.5), "lambd"; "negative lambd")]
    #[test_case(EnhanceParams::new(32, "midpoint", 0.5, 1.1), "tau"; "tau above one")]
    #[test_case(EnhanceParams::new(0, "foo", 0.5, 0.5), "nfe"; "nfe checked first")]
    fn test_rejects(params: EnhanceParams, field: &str) {
        match params.validate() {
            Err(EnhanceError::InvalidParameter { param, .. }) => assert_eq!(param, field),
            other => panic!("expected InvalidParameter for {}, got {:?}", field, other),
        }
    }

    #[test_case(1, "euler", 0.0, 0.0)]
    #[test_case(128, "rk4", 1.0, 1.0)]
    #[test_case(64, "midpoint", 0.25, 0.75)]
    fn test_accepts_boundaries(nfe: u32, solver: &str, lambd: f32, tau: f32) {
        let config = EnhanceParams::new(nfe, solver, lambd, tau).validate().unwrap();
        assert_eq!(config.nfe, nfe);
        assert_eq!(config.solver.as_str(), solver);
    }
}
