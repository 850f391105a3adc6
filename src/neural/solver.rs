//! Solver settings for the generative enhancement stage

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EnhanceError, Result};

/// Upper bound on function evaluations per enhancement
pub const MAX_NFE: u32 = 128;

/// ODE integration scheme used by the enhancer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    Midpoint,
    Rk4,
    Euler,
}

impl Default for Solver {
    fn default() -> Self {
        Self::Midpoint
    }
}

impl Solver {
    pub const ALL: [Solver; 3] = [Solver::Midpoint, Solver::Rk4, Solver::Euler];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Midpoint => "midpoint",
            Self::Rk4 => "rk4",
            Self::Euler => "euler",
        }
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Solver {
    type Err = EnhanceError;

    /// Exact, case-sensitive match on the three solver names.
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|solver| solver.as_str() == s)
            .ok_or_else(|| {
                EnhanceError::invalid_param("solver", s, "one of ('midpoint', 'rk4', 'euler')")
            })
    }
}

/// Validated, immutable enhancement settings for a single call.
///
/// Passed alongside the waveform into the model forward pass; cached model
/// instances never hold per-call configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhanceConfig {
    /// Number of function evaluations, in (0, 128]
    pub nfe: u32,
    pub solver: Solver,
    /// Denoising strength, in [0, 1]
    pub lambd: f32,
    /// Prior temperature, in [0, 1]
    pub tau: f32,
}

impl EnhanceConfig {
    pub fn new(nfe: u32, solver: Solver, lambd: f32, tau: f32) -> Result<Self> {
        if nfe == 0 || nfe > MAX_NFE {
            return Err(EnhanceError::invalid_param(
                "nfe",
                nfe,
                "integer in (0, 128]",
            ));
        }
        if !(0.0..=1.0).contains(&lambd) {
            return Err(EnhanceError::invalid_param("lambd", lambd, "value in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&tau) {
            return Err(EnhanceError::invalid_param("tau", tau, "value in [0, 1]"));
        }
        Ok(Self {
            nfe,
            solver,
            lambd,
            tau,
        })
    }
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            nfe: 32,
            solver: Solver::Midpoint,
            lambd: 0.5,
            tau: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_parsing_is_exact() {
        assert_eq!("rk4".parse::<Solver>().unwrap(), Solver::Rk4);
        assert_eq!("euler".parse::<Solver>().unwrap(), Solver::Euler);
        assert!("RK4".parse::<Solver>().is_err());
        assert!("foo".parse::<Solver>().is_err());
    }

    #[test]
    fn test_config_bounds() {
        assert!(EnhanceConfig::new(1, Solver::Euler, 0.0, 1.0).is_ok());
        assert!(EnhanceConfig::new(128, Solver::Rk4, 1.0, 0.0).is_ok());
        assert!(EnhanceConfig::new(0, Solver::Euler, 0.5, 0.5).is_err());
        assert!(EnhanceConfig::new(129, Solver::Euler, 0.5, 0.5).is_err());
        assert!(EnhanceConfig::new(32, Solver::Euler, f32::NAN, 0.5).is_err());
    }
}
