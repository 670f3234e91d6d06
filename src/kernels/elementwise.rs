//! Elementwise kernels: abs, scale, elementwise_add

use crate::error::{ForgeResult, KernForgeError};
use crate::kernels::KernelArgs;
use crate::tensor::{DenseTensor, DeviceContext, Element};

pub fn abs_entry<T: Element>(
    _ctx: &DeviceContext,
    args: &KernelArgs<'_>,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    let x = args.input(0)?;
    let values = x.as_slice::<T>()?.iter().map(|v| v.abs_value()).collect();
    out.set_data(x.shape().to_vec(), values)
}

/// `out = scale * x + bias`, or `scale * (x + bias)` when
/// `bias_after_scale` is false.
///
/// Integer tensors with whole-number `scale` and `bias` are computed
/// exactly in i128. Otherwise arithmetic runs in f64, and an integer input
/// that f64 cannot hold exactly is rejected. A result that does not fit
/// `T` is an error.
pub fn scale_entry<T: Element>(
    _ctx: &DeviceContext,
    args: &KernelArgs<'_>,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    let x = args.input(0)?;
    let scale = args.attrs().float_or("scale", 1.0)?;
    let bias = args.attrs().float_or("bias", 0.0)?;
    let bias_after_scale = args.attrs().bool_or("bias_after_scale", true)?;

    let integral = |f: f64| f.fract() == 0.0 && f.abs() < i64::MAX as f64;
    let values = if !T::DTYPE.is_float() && integral(scale) && integral(bias) {
        let (scale, bias) = (scale as i128, bias as i128);
        x.as_slice::<T>()?
            .iter()
            .map(|&v| {
                let v: i128 = num_traits::cast(v).ok_or_else(|| overflow::<T>(&v))?;
                let r = if bias_after_scale {
                    scale.checked_mul(v).and_then(|p| p.checked_add(bias))
                } else {
                    v.checked_add(bias).and_then(|s| s.checked_mul(scale))
                };
                r.and_then(num_traits::cast::<i128, T>)
                    .ok_or_else(|| overflow::<T>(&r))
            })
            .collect::<ForgeResult<Vec<T>>>()?
    } else {
        x.as_slice::<T>()?
            .iter()
            .map(|&v| {
                let wide: f64 = num_traits::cast(v).ok_or_else(|| overflow::<T>(&v))?;
                if !T::DTYPE.is_float() && num_traits::cast::<f64, T>(wide) != Some(v) {
                    return Err(KernForgeError::InvalidAttribute(format!(
                        "{} value {:?} is not exact in f64 with a fractional scale or bias",
                        T::DTYPE,
                        v
                    )));
                }
                let r = if bias_after_scale {
                    scale * wide + bias
                } else {
                    scale * (wide + bias)
                };
                num_traits::cast::<f64, T>(r).ok_or_else(|| overflow::<T>(&r))
            })
            .collect::<ForgeResult<Vec<T>>>()?
    };
    out.set_data(x.shape().to_vec(), values)
}

fn overflow<T: Element>(value: &dyn std::fmt::Debug) -> KernForgeError {
    KernForgeError::ArithmeticOverflow(format!("result {:?} does not fit {}", value, T::DTYPE))
}

fn sum<T: Element>(x: T, y: T) -> ForgeResult<T> {
    x.checked_sum(y).ok_or_else(|| {
        KernForgeError::ArithmeticOverflow(format!("{:?} + {:?} overflows {}", x, y, T::DTYPE))
    })
}

/// Sum of two same-shaped tensors. Either side may be a one-element
/// tensor, which is broadcast.
pub fn add_entry<T: Element>(
    _ctx: &DeviceContext,
    args: &KernelArgs<'_>,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    let lhs = args.input(0)?;
    let rhs = args.input(1)?;
    let a = lhs.as_slice::<T>()?;
    let b = rhs.as_slice::<T>()?;

    let (shape, values) = if lhs.shape() == rhs.shape() {
        (
            lhs.shape().to_vec(),
            a.iter().zip(b).map(|(&x, &y)| sum(x, y)).collect::<ForgeResult<Vec<T>>>()?,
        )
    } else if b.len() == 1 {
        let values = a.iter().map(|&x| sum(x, b[0])).collect::<ForgeResult<Vec<T>>>()?;
        (lhs.shape().to_vec(), values)
    } else if a.len() == 1 {
        let values = b.iter().map(|&y| sum(a[0], y)).collect::<ForgeResult<Vec<T>>>()?;
        (rhs.shape().to_vec(), values)
    } else {
        return Err(KernForgeError::InvalidShape(format!(
            "cannot add shapes {:?} and {:?}",
            lhs.shape(),
            rhs.shape()
        )));
    };
    out.set_data(shape, values)
}
