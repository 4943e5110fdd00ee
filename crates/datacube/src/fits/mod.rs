//! Minimal FITS container support: reads the first image HDU that carries a
//! cube and writes a cube back as a single primary HDU.

pub mod card;
pub mod image;

use std::path::Path;

use ndarray::{Array3, ArrayView3};
use tracing::{info, warn};

use crate::element::CubeElement;
use crate::error::{Error, Result};
use crate::header::{Card, Header, Value};
use crate::source::CubeReader;

use card::{padded_byte_len, parse_header, serialize_header};
use image::{bytes_per_pixel, decode_pixels, encode_pixels, Scaling};

/// Keywords regenerated by the writer and dropped from the copied header.
const STRUCTURAL_KEYS: &[&str] = &[
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "EXTEND", "PCOUNT", "GCOUNT", "BSCALE", "BZERO",
    "BLANK",
];

fn is_structural(keyword: &str) -> bool {
    STRUCTURAL_KEYS.contains(&keyword)
        || keyword
            .strip_prefix("NAXIS")
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// The built-in [`CubeReader`] for FITS files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitsReader;

impl CubeReader for FitsReader {
    fn read(&self, path: &Path) -> Result<(Array3<f64>, Header)> {
        let bytes = std::fs::read(path)?;
        let (data, header) = read_cube_bytes(&bytes)?;
        info!(path = %path.display(), shape = ?data.shape(), "read FITS cube");
        Ok((data, header))
    }
}

fn axis_lengths(header: &Header) -> Result<Vec<usize>> {
    let naxis = header
        .get("NAXIS")
        .and_then(Value::as_i64)
        .ok_or(Error::InvalidHeader("missing NAXIS"))?;
    (1..=naxis)
        .map(|i| {
            header
                .get(&format!("NAXIS{i}"))
                .and_then(Value::as_i64)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or(Error::InvalidHeader("missing or negative NAXISn"))
        })
        .collect()
}

/// Decode the first image HDU with data from an in-memory FITS stream.
///
/// Trailing axes of length 1 beyond the third are dropped; the remaining
/// image must be three-dimensional.
pub fn read_cube_bytes(bytes: &[u8]) -> Result<(Array3<f64>, Header)> {
    let mut offset = 0;
    while offset < bytes.len() {
        let (cards, header_len) = parse_header(&bytes[offset..])?;
        let mut header = Header::from_cards(cards);
        let bitpix = header
            .get("BITPIX")
            .and_then(Value::as_i64)
            .ok_or(Error::InvalidHeader("missing BITPIX"))?;
        let mut naxes = axis_lengths(&header)?;

        let is_image = offset == 0
            || header.get("XTENSION").and_then(Value::as_str) == Some("IMAGE");
        let elements: usize = if naxes.is_empty() {
            0
        } else {
            naxes.iter().product()
        };
        let pcount = header.float_or("PCOUNT", 0.0) as usize;
        let gcount = header.float_or("GCOUNT", 1.0) as usize;
        let data_len = bytes_per_pixel(bitpix)? * (pcount + elements) * gcount;
        let data_start = offset + header_len;

        if !is_image || elements == 0 {
            offset = data_start + padded_byte_len(data_len);
            continue;
        }

        let raw = bytes
            .get(data_start..data_start + elements * bytes_per_pixel(bitpix)?)
            .ok_or(Error::UnexpectedEof)?;
        let pixels = decode_pixels(raw, bitpix, &Scaling::from_header(&header))?;

        while naxes.len() > 3 && naxes.last() == Some(&1) {
            let n = naxes.len();
            warn!(axis = n, "dropping degenerate axis");
            header.remove(&format!("NAXIS{n}"));
            naxes.pop();
        }
        if naxes.len() != 3 {
            return Err(Error::InvalidHeader("image is not a three-dimensional cube"));
        }
        header.set("NAXIS", naxes.len());
        for key in ["BSCALE", "BZERO", "BLANK"] {
            header.remove(key);
        }

        let shape = (naxes[2], naxes[1], naxes[0]);
        let data = Array3::from_shape_vec(shape, pixels).map_err(|_| Error::ShapeMismatch {
            expected: vec![naxes[2], naxes[1], naxes[0]],
            found: vec![elements],
        })?;
        return Ok((data, header));
    }
    Err(Error::InvalidHeader("no image HDU with data"))
}

/// Serialize a cube and its header as a single primary HDU.
///
/// Structural keywords are regenerated from the array; every other card of
/// `header` is copied in order.
pub fn cube_to_bytes<T: CubeElement>(data: ArrayView3<'_, T>, header: &Header) -> Result<Vec<u8>> {
    let (n3, n2, n1) = data.dim();
    let mut cards = vec![
        Card::new("SIMPLE", true),
        Card::new("BITPIX", T::BITPIX),
        Card::new("NAXIS", 3),
        Card::new("NAXIS1", n1),
        Card::new("NAXIS2", n2),
        Card::new("NAXIS3", n3),
    ];
    cards.extend(
        header
            .cards()
            .filter(|c| !is_structural(&c.keyword))
            .cloned(),
    );

    let mut out = serialize_header(&cards)?;
    out.extend(encode_pixels(data.iter().copied()));
    Ok(out)
}

/// Write a cube to `path` as a FITS file.
pub fn write_cube<T: CubeElement>(
    path: impl AsRef<Path>,
    data: ArrayView3<'_, T>,
    header: &Header,
) -> Result<()> {
    let path = path.as_ref();
    let bytes = cube_to_bytes(data, header)?;
    std::fs::write(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote FITS cube");
    Ok(())
}
