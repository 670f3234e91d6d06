//! Registration table for the kernels shipped with the crate.
//!
//! | op | cpu | gpu (`gpu` feature) | kps (`kps` feature) |
//! |----|-----|---------------------|---------------------|
//! | amax, amax_raw, amin, amin_raw | f32 f64 i32 i64 | f32 f64 i32 i64 | f32 |
//! | abs, scale, elementwise_add | f32 f64 i32 i64 | f32 f64 i32 i64 | - |

use super::elementwise::{abs_entry, add_entry, scale_entry};
use super::reduce::{amax_entry, amax_raw_entry, amin_entry, amin_raw_entry};
use super::registry::KernelRegistry;
use crate::error::ForgeResult;
use crate::register_kernel;
use crate::tensor::{Backend, DataLayout};

/// Register every builtin kernel for the backends compiled into this build.
pub fn register_builtin_kernels(registry: &KernelRegistry) -> ForgeResult<()> {
    register_backend_kernels(registry, Backend::Cpu)?;

    #[cfg(feature = "gpu")]
    register_backend_kernels(registry, Backend::Gpu)?;

    #[cfg(feature = "kps")]
    register_kps_kernels(registry)?;

    Ok(())
}

/// Full dtype matrix; CPU and GPU share the same generic bodies.
fn register_backend_kernels(registry: &KernelRegistry, backend: Backend) -> ForgeResult<()> {
    macro_rules! all_dtypes {
        ($($op:literal => $func:ident),+ $(,)?) => {
            $(
                register_kernel!(
                    registry,
                    $op,
                    backend,
                    DataLayout::All,
                    $func,
                    [f32, f64, i32, i64]
                )?;
            )+
        };
    }

    all_dtypes!(
        "amax" => amax_entry,
        "amax_raw" => amax_raw_entry,
        "amin" => amin_entry,
        "amin_raw" => amin_raw_entry,
        "abs" => abs_entry,
        "scale" => scale_entry,
        "elementwise_add" => add_entry,
    );
    Ok(())
}

#[cfg(feature = "kps")]
fn register_kps_kernels(registry: &KernelRegistry) -> ForgeResult<()> {
    register_kernel!(registry, "amax", Backend::Kps, DataLayout::All, amax_entry, [f32])?;
    register_kernel!(registry, "amax_raw", Backend::Kps, DataLayout::All, amax_raw_entry, [f32])?;
    register_kernel!(registry, "amin", Backend::Kps, DataLayout::All, amin_entry, [f32])?;
    register_kernel!(registry, "amin_raw", Backend::Kps, DataLayout::All, amin_raw_entry, [f32])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::KernelKey;
    use crate::tensor::DType;

    fn fresh() -> KernelRegistry {
        let registry = KernelRegistry::new();
        register_builtin_kernels(&registry).unwrap();
        registry
    }

    #[test]
    fn test_cpu_amax_matrix() {
        let registry = fresh();
        for dtype in DType::ALL {
            let key = KernelKey::new("amax", Backend::Cpu, DataLayout::RowMajor, dtype);
            assert!(registry.lookup(&key).is_ok(), "missing cpu amax {}", dtype);
        }
    }

    #[test]
    fn test_registering_twice_is_rejected() {
        let registry = fresh();
        assert!(register_builtin_kernels(&registry).is_err());
    }

    #[test]
    #[cfg(not(feature = "gpu"))]
    fn test_no_gpu_kernels_without_feature() {
        let registry = fresh();
        assert!(!registry.contains_op("amax", Backend::Gpu));
        assert_eq!(registry.len(), 7 * 4 + if cfg!(feature = "kps") { 4 } else { 0 });
    }

    #[test]
    #[cfg(feature = "gpu")]
    fn test_gpu_amax_matrix() {
        let registry = fresh();
        for dtype in DType::ALL {
            let key = KernelKey::new("amax", Backend::Gpu, DataLayout::All, dtype);
            assert!(registry.lookup(&key).is_ok());
        }
    }

    #[test]
    #[cfg(feature = "kps")]
    fn test_kps_amax_is_f32_only() {
        let registry = fresh();
        let f32_key = KernelKey::new("amax", Backend::Kps, DataLayout::All, DType::F32);
        assert!(registry.lookup(&f32_key).is_ok());
        for dtype in [DType::F64, DType::I32, DType::I64] {
            let key = KernelKey::new("amax", Backend::Kps, DataLayout::All, dtype);
            assert!(registry.lookup(&key).is_err());
        }
        assert!(!registry.contains_op("abs", Backend::Kps));
    }
}
