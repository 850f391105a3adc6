//! Compute device selection
//!
//! [`DeviceSpec`] is the hashable device identifier used in model cache keys.
//! It resolves to a `candle_core::Device` only when a model is actually loaded.

use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{EnhanceError, Result};

/// Target compute device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    Cpu,
    /// NVIDIA GPU by ordinal (requires the `cuda` feature)
    Cuda(usize),
    /// Apple GPU by ordinal (requires the `metal` feature)
    Metal(usize),
}

impl Default for DeviceSpec {
    fn default() -> Self {
        Self::Cpu
    }
}

impl DeviceSpec {
    /// Pick the best device compiled into this build.
    ///
    /// Order: CUDA 0, Metal 0, CPU.
    pub fn auto() -> Self {
        #[cfg(feature = "cuda")]
        {
            if candle_core::utils::cuda_is_available() {
                tracing::info!("Auto-selected CUDA device 0");
                return Self::Cuda(0);
            }
            debug!("CUDA not available, trying alternatives");
        }

        #[cfg(feature = "metal")]
        {
            if candle_core::utils::metal_is_available() {
                tracing::info!("Auto-selected Metal device 0");
                return Self::Metal(0);
            }
            debug!("Metal not available, falling back to CPU");
        }

        debug!("Using CPU device");
        Self::Cpu
    }

    /// Create the candle device for this spec.
    ///
    /// Accelerators requested without the matching feature fall back to CPU
    /// with a warning; a compiled-in accelerator that fails to open is an error.
    pub fn resolve(&self) -> Result<Device> {
        match *self {
            Self::Cpu => Ok(Device::Cpu),

            Self::Cuda(ordinal) => {
                #[cfg(feature = "cuda")]
                {
                    Device::new_cuda(ordinal).map_err(|e| EnhanceError::DeviceUnavailable {
                        device: self.to_string(),
                        reason: e.to_string(),
                    })
                }
                #[cfg(not(feature = "cuda"))]
                {
                    let _ = ordinal;
                    tracing::warn!("CUDA requested but cuda feature not enabled, falling back to CPU");
                    Ok(Device::Cpu)
                }
            }

            Self::Metal(ordinal) => {
                #[cfg(feature = "metal")]
                {
                    Device::new_metal(ordinal).map_err(|e| EnhanceError::DeviceUnavailable {
                        device: self.to_string(),
                        reason: e.to_string(),
                    })
                }
                #[cfg(not(feature = "metal"))]
                {
                    let _ = ordinal;
                    tracing::warn!("Metal requested but metal feature not enabled, falling back to CPU");
                    Ok(Device::Cpu)
                }
            }
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(n) => write!(f, "cuda:{}", n),
            Self::Metal(n) => write!(f, "metal:{}", n),
        }
    }
}

impl FromStr for DeviceSpec {
    type Err = EnhanceError;

    /// Accepts `cpu`, `cuda`, `cuda:N`, `metal`, `metal:N` and `auto`.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let (kind, ordinal) = match lower.split_once(':') {
            Some((kind, n)) => {
                let ordinal = n.parse::<usize>().map_err(|_| {
                    EnhanceError::invalid_param("device", s, "device ordinal like cuda:0")
                })?;
                (kind.to_string(), ordinal)
            }
            None => (lower.clone(), 0),
        };

        match kind.as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda(ordinal)),
            "metal" | "mps" => Ok(Self::Metal(ordinal)),
            "auto" => Ok(Self::auto()),
            _ => Err(EnhanceError::invalid_param(
                "device",
                s,
                "one of: auto, cpu, cuda[:N], metal[:N]",
            )),
        }
    }
}

/// Get device name for display
pub fn device_name(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "CPU",
        Device::Cuda(_) => "CUDA",
        Device::Metal(_) => "Metal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_specs() {
        assert_eq!("cpu".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cpu);
        assert_eq!("cuda".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda(0));
        assert_eq!("CUDA:2".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda(2));
        assert_eq!("metal:1".parse::<DeviceSpec>().unwrap(), DeviceSpec::Metal(1));
        assert!("tpu".parse::<DeviceSpec>().is_err());
        assert!("cuda:x".parse::<DeviceSpec>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for spec in [DeviceSpec::Cpu, DeviceSpec::Cuda(3), DeviceSpec::Metal(0)] {
            assert_eq!(spec.to_string().parse::<DeviceSpec>().unwrap(), spec);
        }
    }

    #[test]
    fn test_cpu_resolves() {
        let device = DeviceSpec::Cpu.resolve().unwrap();
        assert!(matches!(device, Device::Cpu));
        assert_eq!(device_name(&device), "CPU");
    }

    #[test]
    fn test_auto_always_resolves() {
        let device = DeviceSpec::auto().resolve().unwrap();
        let _ = device_name(&device);
    }
}
