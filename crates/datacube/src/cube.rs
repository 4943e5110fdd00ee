//! The datacube: an array, its header, and the caches derived from them.

use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array2, Array3, ArrayBase, ArrayView3, Data, Ix3};
use num_traits::ToPrimitive;
use tracing::debug;

use crate::axes::DerivedAxes;
use crate::brightness;
use crate::channels::{ChannelResolver, ResolvedChannels};
use crate::element::CubeElement;
use crate::error::{Error, Result};
use crate::header::{Header, Value};
use crate::moments::{self, Mask, MomentKind, SpectralCube, SpectralSelection};
use crate::preset::HeaderPreset;
use crate::source::{CubeReader, CubeSource};
use crate::spectra;
use crate::units::{VelocityUnit, VelocityValue};
use crate::wcs::Wcs;

/// Construction-time settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CubeOptions {
    /// Header defaults applied right after loading.
    pub preset: Option<HeaderPreset>,
}

impl CubeOptions {
    /// Options that apply `preset` at construction.
    pub fn with_preset(preset: HeaderPreset) -> Self {
        CubeOptions {
            preset: Some(preset),
        }
    }
}

/// A spectral-line cube in `(spectral, y, x)` array order.
///
/// Derived axes are computed on first use and cached against the header
/// version; any header mutation through [`Datacube::header_mut`] or the
/// other mutating methods makes the next read recompute.
#[derive(Debug, Clone)]
pub struct Datacube<T: CubeElement = f32> {
    data: Array3<T>,
    header: Header,
    axes: DerivedAxes,
}

impl<T: CubeElement> Datacube<T> {
    /// Build from a [`CubeSource`]. A path is read with the built-in FITS
    /// reader; otherwise both data and header must be present.
    pub fn new(source: CubeSource<T>, options: CubeOptions) -> Result<Self> {
        match source {
            #[cfg(feature = "fits")]
            CubeSource {
                path: Some(path), ..
            } => Self::open_with(&crate::fits::FitsReader, path, options),
            CubeSource {
                data: Some(data),
                header: Some(header),
                ..
            } => Self::from_parts(data, header, options),
            _ => Err(Error::Construction),
        }
    }

    /// Read a FITS file.
    #[cfg(feature = "fits")]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(&crate::fits::FitsReader, path, CubeOptions::default())
    }

    /// Read a cube through `reader`.
    pub fn open_with<R>(reader: &R, path: impl AsRef<Path>, options: CubeOptions) -> Result<Self>
    where
        R: CubeReader + ?Sized,
    {
        let (data, header) = reader.read(path.as_ref())?;
        Self::from_parts(data.mapv(T::cast_from), header, options)
    }

    /// Build from an array and header. `NAXISn` keywords, when present, must
    /// agree with the array shape.
    pub fn from_parts(data: Array3<T>, mut header: Header, options: CubeOptions) -> Result<Self> {
        check_header_shape(&header, data.shape())?;
        if let Some(preset) = options.preset {
            preset.apply(&mut header);
        }
        Ok(Datacube {
            data,
            header,
            axes: DerivedAxes::new(),
        })
    }

    /// The cube array, `(spectral, y, x)` for a standard header.
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    /// Replace the samples, casting from any primitive numeric type. The
    /// shape must not change.
    pub fn set_data<S, U>(&mut self, data: &ArrayBase<S, Ix3>) -> Result<()>
    where
        S: Data<Elem = U>,
        U: ToPrimitive + Clone,
    {
        if data.shape() != self.data.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.data.shape().to_vec(),
                found: data.shape().to_vec(),
            });
        }
        self.data = data.mapv(T::cast_from);
        Ok(())
    }

    /// The header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Mutable header access. Every change bumps the header version, so
    /// cached axes are recomputed on the next read.
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Replace the whole header; it must agree with the array shape.
    pub fn set_header(&mut self, header: Header) -> Result<()> {
        check_header_shape(&header, self.data.shape())?;
        self.header = header;
        self.axes.clear();
        Ok(())
    }

    /// Number of spectral channels.
    pub fn channels(&self) -> Result<usize> {
        Ok(self.data.len_of(self.spectral_array_axis()?))
    }

    /// Coordinate system for the current header.
    pub fn wcs(&self) -> Result<Arc<Wcs>> {
        self.axes.wcs(&self.header)
    }

    /// Channel world coordinates in the spectral axis unit.
    pub fn spectral_world(&self) -> Result<Arc<Array1<f64>>> {
        self.axes.spectral_world(&self.header, self.channels()?)
    }

    /// Channel frequencies in Hz.
    pub fn frequencies(&self) -> Result<Arc<Array1<f64>>> {
        self.axes.frequencies(&self.header, self.channels()?)
    }

    /// Radio-convention velocity of each channel.
    pub fn radio_velocities(&self) -> Result<Arc<Array1<f64>>> {
        self.axes.radio_velocities(&self.header, self.channels()?)
    }

    /// Optical-convention velocity of each channel.
    pub fn optical_velocities(&self) -> Result<Arc<Array1<f64>>> {
        self.axes.optical_velocities(&self.header, self.channels()?)
    }

    /// Channel velocities used for moments and channel lookup (radio
    /// convention).
    pub fn velocities(&self) -> Result<Arc<Array1<f64>>> {
        self.radio_velocities()
    }

    /// Unit of the velocity axes.
    pub fn velocity_unit(&self) -> Result<VelocityUnit> {
        self.axes.velocity_unit(&self.header)
    }

    /// Channels nearest to `velocities` on the radio velocity axis. Bare
    /// numbers are taken to be in [`Datacube::velocity_unit`].
    pub fn channels_for_velocities<V>(&self, velocities: &[V]) -> Result<ResolvedChannels>
    where
        V: Into<VelocityValue> + Copy,
    {
        let axis = self.radio_velocities()?;
        let resolver = ChannelResolver::new(axis.view(), self.velocity_unit()?);
        Ok(resolver.channels_for_velocities(velocities))
    }

    /// Moment map over `selection`; see [`moments::moment`].
    pub fn moment(
        &self,
        selection: SpectralSelection,
        kind: MomentKind,
        mask: Option<&Mask<'_>>,
    ) -> Result<Array2<f64>> {
        moments::moment(self, selection, kind, mask)
    }

    /// Convert the brightness unit in place. On error the cube is unchanged.
    pub fn convert_brightness_unit(&mut self, target: &str) -> Result<()> {
        brightness::convert(&mut self.data, &mut self.header, target)
    }

    /// Spectrum nearest to a sky position in the cube's own frame (degrees).
    pub fn pixel_spectrum(&self, lon: f64, lat: f64) -> Result<Array1<f64>> {
        spectra::pixel_spectrum(self, lon, lat)
    }

    /// [`Datacube::pixel_spectrum`] for several positions.
    pub fn pixel_spectra(&self, positions: &[(f64, f64)]) -> Result<Vec<Array1<f64>>> {
        spectra::pixel_spectra(self, positions)
    }

    /// Mask-weighted spectrum summed over the image plane.
    pub fn integrated_spectrum(&self, mask: Option<&Mask<'_>>) -> Result<Array1<f64>> {
        spectra::integrated_spectrum(self, mask)
    }

    /// Apply `preset` to the header, invalidating derived axes.
    pub fn apply_preset(&mut self, preset: HeaderPreset) {
        debug!(?preset, "applying header preset");
        preset.apply(&mut self.header);
    }

    /// Write the cube as a FITS file.
    #[cfg(feature = "fits")]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        crate::fits::write_cube(path, self.data.view(), &self.header)
    }
}

impl<T: CubeElement> SpectralCube for Datacube<T> {
    type Elem = T;

    fn data(&self) -> ArrayView3<'_, T> {
        self.data.view()
    }

    fn wcs(&self) -> Result<Arc<Wcs>> {
        Datacube::wcs(self)
    }

    fn radio_velocities(&self) -> Result<Arc<Array1<f64>>> {
        Datacube::radio_velocities(self)
    }

    fn velocity_unit(&self) -> Result<VelocityUnit> {
        Datacube::velocity_unit(self)
    }
}

/// `NAXIS1..3`, where present, must match the array shape reversed.
fn check_header_shape(header: &Header, shape: &[usize]) -> Result<()> {
    let expected: Vec<usize> = shape.iter().rev().copied().collect();
    for (i, &n) in expected.iter().enumerate() {
        if let Some(found) = header.get(&format!("NAXIS{}", i + 1)).and_then(Value::as_i64) {
            if found != n as i64 {
                return Err(Error::ShapeMismatch {
                    expected: shape.to_vec(),
                    found: (1..=3)
                        .rev()
                        .map(|j| {
                            header
                                .get(&format!("NAXIS{j}"))
                                .and_then(Value::as_i64)
                                .unwrap_or(0)
                                .max(0) as usize
                        })
                        .collect(),
                });
            }
        }
    }
    Ok(())
}
