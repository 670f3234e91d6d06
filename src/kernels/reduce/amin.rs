//! amin: minimum absolute value over the reduced axes

use super::{reduce_with, ReducePlan};
use crate::error::ForgeResult;
use crate::kernels::KernelArgs;
use crate::tensor::{DenseTensor, DeviceContext, Element};

fn min_of<T: Element>(a: T, b: T) -> T {
    if b < a {
        b
    } else {
        a
    }
}

pub fn amin_raw_kernel<T: Element>(
    ctx: &DeviceContext,
    x: &DenseTensor,
    dims: &[i64],
    keep_dim: bool,
    reduce_all: bool,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    let plan = ReducePlan::new(x.shape(), dims, keep_dim, reduce_all)?;
    tracing::trace!(backend = %ctx.backend(), dtype = %T::DTYPE, axes = ?plan.axes, "amin");
    let values = reduce_with(x.as_slice::<T>()?, x.shape(), &plan, T::abs_value, min_of)?;
    out.set_data(plan.out_shape, values)
}

pub fn amin_kernel<T: Element>(
    ctx: &DeviceContext,
    x: &DenseTensor,
    dims: &[i64],
    keep_dim: bool,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    amin_raw_kernel::<T>(ctx, x, dims, keep_dim, false, out)
}

pub fn amin_entry<T: Element>(
    ctx: &DeviceContext,
    args: &KernelArgs<'_>,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    let dims = args.attrs().ints_or("dims", &[])?;
    let keep_dim = args.attrs().bool_or("keep_dim", false)?;
    amin_kernel::<T>(ctx, args.input(0)?, &dims, keep_dim, out)
}

pub fn amin_raw_entry<T: Element>(
    ctx: &DeviceContext,
    args: &KernelArgs<'_>,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    let dims = args.attrs().ints_or("dims", &[])?;
    let keep_dim = args.attrs().bool_or("keep_dim", false)?;
    let reduce_all = args.attrs().bool_or("reduce_all", false)?;
    amin_raw_kernel::<T>(ctx, args.input(0)?, &dims, keep_dim, reduce_all, out)
}
