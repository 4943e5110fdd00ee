//! Per-channel spectral axes, computed lazily and cached against the header
//! version.
//!
//! A slot holds `(version, Arc<value>)`. A read whose header version differs
//! from the stored one recomputes; otherwise the stored `Arc` is handed out
//! again, so repeated reads of a current entry are pointer-equal.

use std::sync::Arc;

use ndarray::Array1;
use parking_lot::RwLock;
use tracing::debug;
use uom::si::frequency::hertz;

use crate::error::Result;
use crate::header::Header;
use crate::units::{DopplerConvention, SpectralUnit, VelocityUnit};
use crate::wcs::Wcs;

/// One versioned cache entry.
#[derive(Debug)]
pub(crate) struct Slot<V> {
    entry: RwLock<Option<(u64, Arc<V>)>>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Slot {
            entry: RwLock::new(None),
        }
    }
}

impl<V> Slot<V> {
    /// Current value for `version`, computing it with `init` when the entry
    /// is missing or stale.
    pub(crate) fn get_or_try_init(
        &self,
        version: u64,
        init: impl FnOnce() -> Result<V>,
    ) -> Result<Arc<V>> {
        if let Some((v, value)) = &*self.entry.read() {
            if *v == version {
                return Ok(Arc::clone(value));
            }
        }
        let fresh = Arc::new(init()?);
        let mut entry = self.entry.write();
        // another reader may have filled the slot meanwhile
        if let Some((v, value)) = &*entry {
            if *v == version {
                return Ok(Arc::clone(value));
            }
        }
        *entry = Some((version, Arc::clone(&fresh)));
        Ok(fresh)
    }

    /// Drop every cached entry.
    pub(crate) fn clear(&mut self) {
        *self.entry.get_mut() = None;
    }
}

/// Lazily derived coordinate data of a cube.
#[derive(Debug, Default)]
pub struct DerivedAxes {
    wcs: Slot<Wcs>,
    spectral_world: Slot<Array1<f64>>,
    frequencies: Slot<Array1<f64>>,
    radio: Slot<Array1<f64>>,
    optical: Slot<Array1<f64>>,
}

impl Clone for DerivedAxes {
    /// Clones start with empty caches.
    fn clone(&self) -> Self {
        DerivedAxes::default()
    }
}

impl DerivedAxes {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached entry.
    pub fn clear(&mut self) {
        self.wcs.clear();
        self.spectral_world.clear();
        self.frequencies.clear();
        self.radio.clear();
        self.optical.clear();
    }

    /// Coordinate system for the current header version.
    pub fn wcs(&self, header: &Header) -> Result<Arc<Wcs>> {
        self.wcs.get_or_try_init(header.version(), || {
            debug!(version = header.version(), "building coordinate system");
            Wcs::from_header(header)
        })
    }

    /// World coordinate of channels `0..channels`, in the spectral axis unit.
    pub fn spectral_world(&self, header: &Header, channels: usize) -> Result<Arc<Array1<f64>>> {
        let wcs = self.wcs(header)?;
        self.spectral_world
            .get_or_try_init(header.version(), || {
                debug!(version = header.version(), channels, "computing spectral world axis");
                let world = (0..channels)
                    .map(|i| wcs.spectral_pixel_to_world(i as f64))
                    .collect::<Result<Vec<f64>>>()?;
                Ok(Array1::from(world))
            })
    }

    /// Channel frequencies in Hz.
    pub fn frequencies(&self, header: &Header, channels: usize) -> Result<Arc<Array1<f64>>> {
        let wcs = self.wcs(header)?;
        let world = self.spectral_world(header, channels)?;
        self.frequencies.get_or_try_init(header.version(), || {
            debug!(version = header.version(), "computing frequencies");
            let kind = wcs.spectral_axis_type()?;
            let unit = wcs.spectral_unit()?;
            let si = world.mapv(|w| unit.to_si(w));
            match kind.doppler() {
                None => Ok(si),
                Some(convention) => {
                    let rest = header.rest_frequency()?.get::<hertz>();
                    Ok(si.mapv(|v| convention.frequency(v, rest)))
                }
            }
        })
    }

    /// Channel velocities under the radio convention, in [`Self::velocity_unit`].
    pub fn radio_velocities(&self, header: &Header, channels: usize) -> Result<Arc<Array1<f64>>> {
        self.velocities_with(header, channels, DopplerConvention::Radio)
    }

    /// Channel velocities under the optical convention, in [`Self::velocity_unit`].
    pub fn optical_velocities(
        &self,
        header: &Header,
        channels: usize,
    ) -> Result<Arc<Array1<f64>>> {
        self.velocities_with(header, channels, DopplerConvention::Optical)
    }

    fn velocities_with(
        &self,
        header: &Header,
        channels: usize,
        convention: DopplerConvention,
    ) -> Result<Arc<Array1<f64>>> {
        let slot = match convention {
            DopplerConvention::Radio => &self.radio,
            DopplerConvention::Optical => &self.optical,
        };
        let wcs = self.wcs(header)?;
        let target = self.velocity_unit(header)?;
        slot.get_or_try_init(header.version(), || {
            debug!(version = header.version(), ?convention, "computing velocities");
            let kind = wcs.spectral_axis_type()?;
            if kind.doppler() == Some(convention) {
                // axis already in this convention: a pure unit rescale
                let unit = wcs.spectral_unit()?;
                let world = self.spectral_world(header, channels)?;
                return Ok(world.mapv(|w| unit.to_si(w) / target.scale()));
            }
            let rest = header.rest_frequency()?.get::<hertz>();
            let freqs = self.frequencies(header, channels)?;
            Ok(freqs.mapv(|f| convention.velocity(f, rest) / target.scale()))
        })
    }

    /// Unit velocities are reported in: the spectral axis unit for velocity
    /// axes, km/s otherwise.
    pub fn velocity_unit(&self, header: &Header) -> Result<VelocityUnit> {
        let wcs = self.wcs(header)?;
        Ok(match wcs.spectral_unit()? {
            SpectralUnit::Velocity(unit) => unit,
            SpectralUnit::Frequency(_) => VelocityUnit::KilometrePerSecond,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::header::Value;
    use crate::units::SPEED_OF_LIGHT;
    use approx::assert_relative_eq;

    fn velocity_header(ctype: &str) -> Header {
        [
            ("NAXIS", Value::from(3)),
            ("CTYPE1", Value::from("RA---CAR")),
            ("CTYPE2", Value::from("DEC--CAR")),
            ("CDELT1", Value::from(-0.01)),
            ("CDELT2", Value::from(0.01)),
            ("CTYPE3", Value::from(ctype)),
            ("CUNIT3", Value::from("km/s")),
            ("CRPIX3", Value::from(1.0)),
            ("CRVAL3", Value::from(-50.0)),
            ("CDELT3", Value::from(10.0)),
        ]
        .into_iter()
        .collect()
    }

    fn frequency_header() -> Header {
        [
            ("NAXIS", Value::from(3)),
            ("CTYPE3", Value::from("FREQ")),
            ("CUNIT3", Value::from("GHz")),
            ("CRPIX3", Value::from(1.0)),
            ("CRVAL3", Value::from(115.0)),
            ("CDELT3", Value::from(0.01)),
            ("RESTFRQ", Value::from(115.2712018e9)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn repeated_reads_share_the_same_arc() {
        let axes = DerivedAxes::new();
        let header = velocity_header("VRAD");
        let a = axes.radio_velocities(&header, 10).unwrap();
        let b = axes.radio_velocities(&header, 10).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(
            &axes.wcs(&header).unwrap(),
            &axes.wcs(&header).unwrap()
        ));
    }

    #[test]
    fn matching_convention_needs_no_rest_frequency() {
        let axes = DerivedAxes::new();
        let header = velocity_header("VRAD");
        let v = axes.radio_velocities(&header, 10).unwrap();
        assert_relative_eq!(v[0], -50.0);
        assert_relative_eq!(v[9], 40.0);
        assert_eq!(axes.velocity_unit(&header).unwrap(), VelocityUnit::KilometrePerSecond);
        assert!(matches!(
            axes.frequencies(&header, 10),
            Err(Error::MissingKey(_))
        ));
    }

    #[test]
    fn header_mutation_invalidates() {
        let axes = DerivedAxes::new();
        let mut header = velocity_header("VRAD");
        header.set("RESTFRQ", 1.420405751768e9);
        let radio = axes.radio_velocities(&header, 10).unwrap();

        header.set("CTYPE3", "VOPT");
        let after = axes.radio_velocities(&header, 10).unwrap();
        assert!(!Arc::ptr_eq(&radio, &after));
        // optical axis values now pass through frequency
        let rest = 1.420405751768e9;
        let f = DopplerConvention::Optical.frequency(-50.0e3, rest);
        let expected = DopplerConvention::Radio.velocity(f, rest) / 1.0e3;
        assert_relative_eq!(after[0], expected, max_relative = 1e-12);
    }

    #[test]
    fn unsupported_type_surfaces_after_mutation() {
        let axes = DerivedAxes::new();
        let mut header = velocity_header("VRAD");
        axes.radio_velocities(&header, 10).unwrap();
        header.set("CTYPE3", "VELO-LSR");
        assert!(matches!(
            axes.radio_velocities(&header, 10),
            Err(Error::UnsupportedSpectralType(_))
        ));
    }

    #[test]
    fn frequency_axis_to_velocities() {
        let axes = DerivedAxes::new();
        let header = frequency_header();
        let f = axes.frequencies(&header, 5).unwrap();
        assert_relative_eq!(f[0], 115.0e9);
        assert_relative_eq!(f[4], 115.04e9, max_relative = 1e-12);

        let rest = 115.2712018e9;
        let radio = axes.radio_velocities(&header, 5).unwrap();
        assert_relative_eq!(
            radio[0],
            SPEED_OF_LIGHT * (rest - 115.0e9) / rest / 1.0e3,
            max_relative = 1e-12
        );
        let optical = axes.optical_velocities(&header, 5).unwrap();
        assert_relative_eq!(
            optical[0],
            SPEED_OF_LIGHT * (rest / 115.0e9 - 1.0) / 1.0e3,
            max_relative = 1e-12
        );
        // frequency increases, radio velocity decreases
        assert!(radio[4] < radio[0]);
    }

    #[test]
    fn velocity_axis_to_frequencies() {
        let axes = DerivedAxes::new();
        let mut header = velocity_header("VRAD");
        header.set("RESTFRQ", 1.0e9);
        let f = axes.frequencies(&header, 10).unwrap();
        assert_relative_eq!(f[5], 1.0e9, max_relative = 1e-15);
        assert!(f[0] > f[9]);
    }

    #[test]
    fn clone_starts_empty() {
        let axes = DerivedAxes::new();
        let header = velocity_header("VRAD");
        let a = axes.spectral_world(&header, 10).unwrap();
        let copy = axes.clone();
        let b = copy.spectral_world(&header, 10).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
    }
}
