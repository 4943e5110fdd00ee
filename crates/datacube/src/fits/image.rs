//! Pixel decoding and encoding for image HDUs.

use bytemuck::pod_collect_to_vec;

use crate::element::CubeElement;
use crate::error::{Error, Result};
use crate::header::{Header, Value};

use super::card::padded_byte_len;

/// Bytes per pixel for a BITPIX code.
pub fn bytes_per_pixel(bitpix: i64) -> Result<usize> {
    match bitpix {
        8 => Ok(1),
        16 => Ok(2),
        32 | -32 => Ok(4),
        64 | -64 => Ok(8),
        other => Err(Error::InvalidBitpix(other)),
    }
}

/// Linear calibration and undefined-value marker of integer images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub bscale: f64,
    pub bzero: f64,
    pub blank: Option<i64>,
}

impl Default for Scaling {
    fn default() -> Self {
        Scaling {
            bscale: 1.0,
            bzero: 0.0,
            blank: None,
        }
    }
}

impl Scaling {
    /// Read `BSCALE`, `BZERO` and `BLANK`, defaulting to the identity.
    pub fn from_header(header: &Header) -> Self {
        Scaling {
            bscale: header.float_or("BSCALE", 1.0),
            bzero: header.float_or("BZERO", 0.0),
            blank: header.get("BLANK").and_then(Value::as_i64),
        }
    }

    fn integer(&self, raw: i64) -> f64 {
        if self.blank == Some(raw) {
            f64::NAN
        } else {
            self.bzero + self.bscale * raw as f64
        }
    }

    fn float(&self, raw: f64) -> f64 {
        self.bzero + self.bscale * raw
    }
}

/// Decode big-endian pixels into physical values.
pub fn decode_pixels(raw: &[u8], bitpix: i64, scaling: &Scaling) -> Result<Vec<f64>> {
    let bpp = bytes_per_pixel(bitpix)?;
    if raw.len() % bpp != 0 {
        return Err(Error::UnexpectedEof);
    }
    let pixels = match bitpix {
        8 => raw.iter().map(|&p| scaling.integer(p as i64)).collect(),
        16 => {
            let values: Vec<i16> = pod_collect_to_vec(raw);
            values
                .into_iter()
                .map(|v| scaling.integer(i16::from_be(v) as i64))
                .collect()
        }
        32 => {
            let values: Vec<i32> = pod_collect_to_vec(raw);
            values
                .into_iter()
                .map(|v| scaling.integer(i32::from_be(v) as i64))
                .collect()
        }
        64 => {
            let values: Vec<i64> = pod_collect_to_vec(raw);
            values
                .into_iter()
                .map(|v| scaling.integer(i64::from_be(v)))
                .collect()
        }
        -32 => {
            let values: Vec<u32> = pod_collect_to_vec(raw);
            values
                .into_iter()
                .map(|v| scaling.float(f32::from_bits(u32::from_be(v)) as f64))
                .collect()
        }
        -64 => {
            let values: Vec<u64> = pod_collect_to_vec(raw);
            values
                .into_iter()
                .map(|v| scaling.float(f64::from_bits(u64::from_be(v))))
                .collect()
        }
        other => return Err(Error::InvalidBitpix(other)),
    };
    Ok(pixels)
}

/// Encode pixels as a zero-padded FITS data segment.
pub fn encode_pixels<T: CubeElement>(pixels: impl ExactSizeIterator<Item = T>) -> Vec<u8> {
    let raw_len = pixels.len() * (T::BITPIX.unsigned_abs() as usize / 8);
    let mut out = Vec::with_capacity(padded_byte_len(raw_len));
    for p in pixels {
        p.write_be(&mut out);
    }
    out.resize(padded_byte_len(raw_len), 0);
    out
}
