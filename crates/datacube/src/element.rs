use core::fmt::Debug;

use num_traits::{Float, NumCast, ToPrimitive};

/// Floating-point element type a cube can hold.
pub trait CubeElement: Float + Debug + Send + Sync + 'static {
    /// FITS BITPIX code used when the cube is written.
    const BITPIX: i64;

    /// Append the big-endian encoding of `self` to `out`.
    fn write_be(self, out: &mut Vec<u8>);

    /// Cast any primitive number into the element type; values that do not
    /// fit become NaN.
    fn cast_from<U: ToPrimitive>(value: U) -> Self {
        <Self as NumCast>::from(value).unwrap_or_else(Self::nan)
    }
}

impl CubeElement for f32 {
    const BITPIX: i64 = -32;

    fn write_be(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }
}

impl CubeElement for f64 {
    const BITPIX: i64 = -64;

    fn write_be(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }
}
