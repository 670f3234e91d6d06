//! Backends, memory layouts and device placement.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeResult, KernForgeError};

/// Upper bound on device ids accepted for GPU and KPS places
pub const MAX_DEVICES: u32 = 8;

/// Class of execution device a kernel is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Cpu,
    Gpu,
    /// Accelerator kernel-set backend
    Kps,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Cpu, Backend::Gpu, Backend::Kps];

    /// Whether support for this backend was compiled into this build.
    ///
    /// CPU is always present; GPU and KPS follow the `gpu` and `kps`
    /// cargo features.
    pub fn is_compiled(&self) -> bool {
        match self {
            Backend::Cpu => true,
            Backend::Gpu => cfg!(feature = "gpu"),
            Backend::Kps => cfg!(feature = "kps"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Cpu => "cpu",
            Backend::Gpu => "gpu",
            Backend::Kps => "kps",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Memory arrangement a kernel accepts.
///
/// `All` is the wildcard: a kernel registered with it serves any requested
/// layout. Callers never ask for `All` specifically; they ask for the layout
/// their tensors actually have.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DataLayout {
    #[default]
    All,
    RowMajor,
    ColMajor,
    Strided,
}

impl DataLayout {
    /// Whether a kernel registered with `self` can serve a request for `requested`
    pub fn accepts(&self, requested: DataLayout) -> bool {
        *self == DataLayout::All || *self == requested
    }
}

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataLayout::All => "ALL_LAYOUT",
            DataLayout::RowMajor => "row_major",
            DataLayout::ColMajor => "col_major",
            DataLayout::Strided => "strided",
        };
        write!(f, "{}", s)
    }
}

/// Device placement: which backend, and which device of that backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Place {
    pub backend: Backend,
    pub device_id: u32,
}

impl Place {
    pub fn new(backend: Backend, device_id: u32) -> Self {
        Self { backend, device_id }
    }

    pub fn cpu() -> Self {
        Self::new(Backend::Cpu, 0)
    }

    pub fn gpu(device_id: u32) -> Self {
        Self::new(Backend::Gpu, device_id)
    }

    pub fn kps(device_id: u32) -> Self {
        Self::new(Backend::Kps, device_id)
    }

    /// Check the place can be used in this build.
    pub fn validate(&self) -> ForgeResult<()> {
        if !self.backend.is_compiled() {
            return Err(KernForgeError::InvalidPlace(format!(
                "{} support is not compiled into this build (enable the `{}` feature)",
                self,
                self.backend.name()
            )));
        }
        match self.backend {
            Backend::Cpu if self.device_id != 0 => Err(KernForgeError::InvalidPlace(format!(
                "cpu place must use device 0, got {}",
                self.device_id
            ))),
            Backend::Gpu | Backend::Kps if self.device_id >= MAX_DEVICES => {
                Err(KernForgeError::InvalidPlace(format!(
                    "device id {} out of range for {} (max {})",
                    self.device_id,
                    self.backend,
                    MAX_DEVICES - 1
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for Place {
    fn default() -> Self {
        Self::cpu()
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.backend {
            Backend::Cpu => write!(f, "cpu"),
            other => write!(f, "{}:{}", other, self.device_id),
        }
    }
}

impl FromStr for Place {
    type Err = KernForgeError;

    /// Parses "cpu", "gpu", "gpu:1", "kps:0"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (backend, id) = match s.split_once(':') {
            Some((b, id)) => (b, Some(id)),
            None => (s, None),
        };
        let backend = match backend.trim().to_lowercase().as_str() {
            "cpu" => Backend::Cpu,
            "gpu" | "cuda" | "hip" => Backend::Gpu,
            "kps" | "xpu" => Backend::Kps,
            other => {
                return Err(KernForgeError::InvalidPlace(format!(
                    "unknown backend '{}'",
                    other
                )))
            }
        };
        let device_id = match id {
            Some(id) => id.trim().parse::<u32>().map_err(|_| {
                KernForgeError::InvalidPlace(format!("bad device id '{}'", id))
            })?,
            None => 0,
        };
        Ok(Place::new(backend, device_id))
    }
}

/// Per-call device handle passed to every kernel.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    place: Place,
}

impl DeviceContext {
    pub fn new(place: Place) -> Self {
        Self { place }
    }

    pub fn place(&self) -> Place {
        self.place
    }

    pub fn backend(&self) -> Backend {
        self.place.backend
    }
}
