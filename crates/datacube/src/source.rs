//! Where a cube comes from: a path handed to a [`CubeReader`], or an array
//! and header supplied directly.

use std::path::{Path, PathBuf};

use ndarray::Array3;

use crate::error::Result;
use crate::header::Header;

/// Reads a cube container from disk.
///
/// Implementations return physical values (scaling applied, undefined
/// samples as NaN) in `(spectral, y, x)` order together with the header.
pub trait CubeReader {
    fn read(&self, path: &Path) -> Result<(Array3<f64>, Header)>;
}

/// Construction input for a datacube. Either `path` or both `data` and
/// `header` must be set; a path wins when both are given.
#[derive(Debug, Clone)]
pub struct CubeSource<T> {
    pub path: Option<PathBuf>,
    pub data: Option<Array3<T>>,
    pub header: Option<Header>,
}

impl<T> Default for CubeSource<T> {
    fn default() -> Self {
        CubeSource {
            path: None,
            data: None,
            header: None,
        }
    }
}

impl<T> CubeSource<T> {
    /// Source read from `path` by the built-in reader.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        CubeSource {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Source from an array and its header.
    pub fn from_parts(data: Array3<T>, header: Header) -> Self {
        CubeSource {
            path: None,
            data: Some(data),
            header: Some(header),
        }
    }

    /// Set the array.
    pub fn with_data(mut self, data: Array3<T>) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the header.
    pub fn with_header(mut self, header: Header) -> Self {
        self.header = Some(header);
        self
    }
}
