use thiserror::Error;

/// All errors that can occur while building or reducing a datacube.
#[derive(Debug, Error)]
pub enum Error {
    /// Neither a path nor a complete (data, header) pair was supplied.
    #[error("either a path or both data and header have to be set")]
    Construction,
    /// None of the candidate keywords are present in the header.
    #[error("missing header keyword (tried {})", .0.join(", "))]
    MissingKey(Vec<String>),
    /// A keyword is present but holds a value of the wrong type.
    #[error("invalid value for header keyword {key}")]
    InvalidValue { key: String },
    /// The spectral axis CTYPE is not a recognised convention.
    #[error("unsupported spectral axis type: {0:?}")]
    UnsupportedSpectralType(String),
    /// The coordinate system lacks a spectral axis or a celestial axis pair.
    #[error("coordinate system has no {0} axis")]
    MissingAxis(&'static str),
    /// The mask matches neither a spatial plane nor the full cube.
    #[error("mask shape {found:?} matches neither plane {plane:?} nor cube {cube:?}")]
    IncompatibleMaskShape {
        found: Vec<usize>,
        plane: Vec<usize>,
        cube: Vec<usize>,
    },
    /// No conversion path between two brightness units.
    #[error("cannot convert brightness unit {from:?} to {to:?}")]
    IncompatibleUnit { from: String, to: String },
    /// A unit string that could not be parsed.
    #[error("unknown unit: {0:?}")]
    UnknownUnit(String),
    /// Moment order other than 0 or 1.
    #[error("unsupported moment order: {0}")]
    UnsupportedMoment(u8),
    /// An array does not have the expected shape.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// A pixel position falls outside the image plane.
    #[error("pixel ({x}, {y}) is outside the image")]
    OutOfBounds { x: f64, y: f64 },
    /// Malformed FITS header block.
    #[error("invalid FITS header: {0}")]
    InvalidHeader(&'static str),
    /// Malformed keyword name in a header card.
    #[error("invalid keyword name")]
    InvalidKeyword,
    /// Unrecognized BITPIX value.
    #[error("invalid BITPIX value: {0}")]
    InvalidBitpix(i64),
    /// Premature end of data while reading.
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// An I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
