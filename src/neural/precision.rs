//! Numeric precision of model parameters and inputs

use candle_core::DType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EnhanceError, Result};

/// Precision the model runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunMode {
    /// Full precision (FP32)
    #[serde(rename = "fp_32")]
    Fp32,
    /// Half precision (FP16)
    #[serde(rename = "fp_16")]
    Fp16,
}

impl Default for RunMode {
    fn default() -> Self {
        Self::Fp32
    }
}

impl RunMode {
    pub fn dtype(&self) -> DType {
        match self {
            Self::Fp32 => DType::F32,
            Self::Fp16 => DType::F16,
        }
    }

    /// Whether parameters are converted to reduced precision after loading
    pub fn is_half(&self) -> bool {
        matches!(self, Self::Fp16)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fp32 => "fp_32",
            Self::Fp16 => "fp_16",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Fp32 => "Full precision (best quality, most memory)",
            Self::Fp16 => "Half precision (half the memory, GPU recommended)",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = EnhanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fp32" | "fp_32" | "float" | "full" => Ok(Self::Fp32),
            "fp16" | "fp_16" | "half" => Ok(Self::Fp16),
            _ => Err(EnhanceError::invalid_param(
                "run_mode",
                s,
                "one of: fp32, fp16",
            )),
        }
    }
}

/// How the façade converts caller waveforms before inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputCast {
    /// Move to the device and cast to the run mode's dtype, for both
    /// denoise and enhance.
    #[default]
    MatchRunMode,
    /// Denoise casts to half only under `Fp16`; enhance always casts to half.
    Legacy,
}

impl InputCast {
    /// Target dtype for a denoise input, `None` to keep the waveform's dtype
    pub fn denoise_dtype(&self, run_mode: RunMode) -> Option<DType> {
        match self {
            Self::MatchRunMode => Some(run_mode.dtype()),
            Self::Legacy => run_mode.is_half().then_some(DType::F16),
        }
    }

    /// Target dtype for an enhance input
    pub fn enhance_dtype(&self, run_mode: RunMode) -> DType {
        match self {
            Self::MatchRunMode => run_mode.dtype(),
            Self::Legacy => DType::F16,
        }
    }
}

impl FromStr for InputCast {
    type Err = EnhanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "match" | "match_run_mode" => Ok(Self::MatchRunMode),
            "legacy" => Ok(Self::Legacy),
            _ => Err(EnhanceError::invalid_param(
                "input_cast",
                s,
                "one of: match, legacy",
            )),
        }
    }
}
