//! amax: maximum absolute value over the reduced axes

use super::{reduce_with, ReducePlan};
use crate::error::ForgeResult;
use crate::kernels::KernelArgs;
use crate::tensor::{DenseTensor, DeviceContext, Element};

fn max_of<T: Element>(a: T, b: T) -> T {
    if b > a {
        b
    } else {
        a
    }
}

/// Raw primitive with an explicit `reduce_all` policy.
pub fn amax_raw_kernel<T: Element>(
    ctx: &DeviceContext,
    x: &DenseTensor,
    dims: &[i64],
    keep_dim: bool,
    reduce_all: bool,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    let plan = ReducePlan::new(x.shape(), dims, keep_dim, reduce_all)?;
    tracing::trace!(
        backend = %ctx.backend(),
        dtype = %T::DTYPE,
        axes = ?plan.axes,
        reduce_all = plan.reduce_all,
        "amax"
    );
    let values = reduce_with(x.as_slice::<T>()?, x.shape(), &plan, T::abs_value, max_of)?;
    out.set_data(plan.out_shape, values)
}

/// Public amax: never forces a full reduction, the plan decides.
pub fn amax_kernel<T: Element>(
    ctx: &DeviceContext,
    x: &DenseTensor,
    dims: &[i64],
    keep_dim: bool,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    amax_raw_kernel::<T>(ctx, x, dims, keep_dim, false, out)
}

/// Registry entry for `amax` (attrs: `dims`, `keep_dim`)
pub fn amax_entry<T: Element>(
    ctx: &DeviceContext,
    args: &KernelArgs<'_>,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    let dims = args.attrs().ints_or("dims", &[])?;
    let keep_dim = args.attrs().bool_or("keep_dim", false)?;
    amax_kernel::<T>(ctx, args.input(0)?, &dims, keep_dim, out)
}

/// Registry entry for `amax_raw` (attrs: `dims`, `keep_dim`, `reduce_all`)
pub fn amax_raw_entry<T: Element>(
    ctx: &DeviceContext,
    args: &KernelArgs<'_>,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    let dims = args.attrs().ints_or("dims", &[])?;
    let keep_dim = args.attrs().bool_or("keep_dim", false)?;
    let reduce_all = args.attrs().bool_or("reduce_all", false)?;
    amax_raw_kernel::<T>(ctx, args.input(0)?, &dims, keep_dim, reduce_all, out)
}
