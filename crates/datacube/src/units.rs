//! Physical units and the equivalences the cube needs: spectral axis units,
//! the radio and optical Doppler conventions, and the Rayleigh–Jeans relation
//! between flux density and brightness temperature.
//!
//! Everything here is plain arithmetic on SI values; callers decide which
//! rule applies and with which parameters.

use core::fmt;

use uom::si::f64::{Frequency, SolidAngle, Velocity};
use uom::si::frequency::hertz;
use uom::si::solid_angle::steradian;
use uom::si::velocity::meter_per_second;

use crate::error::{Error, Result};

/// Speed of light in vacuum, m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Boltzmann constant, J/K.
pub const BOLTZMANN: f64 = 1.380_649e-23;
/// One jansky in W m⁻² Hz⁻¹.
pub const JANSKY: f64 = 1.0e-26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyUnit {
    Hertz,
    Kilohertz,
    Megahertz,
    Gigahertz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityUnit {
    MetrePerSecond,
    KilometrePerSecond,
}

impl VelocityUnit {
    /// Factor taking a value in this unit to m/s.
    pub fn scale(self) -> f64 {
        match self {
            VelocityUnit::MetrePerSecond => 1.0,
            VelocityUnit::KilometrePerSecond => 1.0e3,
        }
    }

    /// FITS unit string.
    pub fn as_str(self) -> &'static str {
        match self {
            VelocityUnit::MetrePerSecond => "m/s",
            VelocityUnit::KilometrePerSecond => "km/s",
        }
    }
}

/// Unit of a spectral axis as declared by `CUNITn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralUnit {
    Frequency(FrequencyUnit),
    Velocity(VelocityUnit),
}

impl SpectralUnit {
    /// Parse a FITS unit string; matching is case-insensitive and accepts
    /// both `km/s` and `km s-1` spellings.
    pub fn parse(text: &str) -> Result<Self> {
        let normalized: String = text
            .trim()
            .to_ascii_lowercase()
            .replace(" s-1", "/s")
            .replace(".s-1", "/s")
            .replace("s^-1", "/s")
            .split_whitespace()
            .collect();
        let unit = match normalized.as_str() {
            "hz" => SpectralUnit::Frequency(FrequencyUnit::Hertz),
            "khz" => SpectralUnit::Frequency(FrequencyUnit::Kilohertz),
            "mhz" => SpectralUnit::Frequency(FrequencyUnit::Megahertz),
            "ghz" => SpectralUnit::Frequency(FrequencyUnit::Gigahertz),
            "m/s" => SpectralUnit::Velocity(VelocityUnit::MetrePerSecond),
            "km/s" => SpectralUnit::Velocity(VelocityUnit::KilometrePerSecond),
            _ => return Err(Error::UnknownUnit(text.trim().to_string())),
        };
        Ok(unit)
    }

    /// Factor taking a value in this unit to SI (Hz or m/s).
    pub fn scale(self) -> f64 {
        match self {
            SpectralUnit::Frequency(FrequencyUnit::Hertz) => 1.0,
            SpectralUnit::Frequency(FrequencyUnit::Kilohertz) => 1.0e3,
            SpectralUnit::Frequency(FrequencyUnit::Megahertz) => 1.0e6,
            SpectralUnit::Frequency(FrequencyUnit::Gigahertz) => 1.0e9,
            SpectralUnit::Velocity(v) => v.scale(),
        }
    }

    /// Convert `value` in this unit to Hz or m/s.
    pub fn to_si(self, value: f64) -> f64 {
        value * self.scale()
    }

    /// FITS unit string.
    pub fn as_str(self) -> &'static str {
        match self {
            SpectralUnit::Frequency(FrequencyUnit::Hertz) => "Hz",
            SpectralUnit::Frequency(FrequencyUnit::Kilohertz) => "kHz",
            SpectralUnit::Frequency(FrequencyUnit::Megahertz) => "MHz",
            SpectralUnit::Frequency(FrequencyUnit::Gigahertz) => "GHz",
            SpectralUnit::Velocity(v) => v.as_str(),
        }
    }
}

impl fmt::Display for SpectralUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from observed frequency to a velocity-like quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DopplerConvention {
    /// `v = c (f0 - f) / f0`
    Radio,
    /// `v = c (f0 / f - 1)`
    Optical,
}

impl DopplerConvention {
    /// Velocity in m/s for a frequency in Hz.
    pub fn velocity(self, frequency: f64, rest: f64) -> f64 {
        match self {
            DopplerConvention::Radio => SPEED_OF_LIGHT * (rest - frequency) / rest,
            DopplerConvention::Optical => SPEED_OF_LIGHT * (rest / frequency - 1.0),
        }
    }

    /// Frequency in Hz for a velocity in m/s.
    pub fn frequency(self, velocity: f64, rest: f64) -> f64 {
        match self {
            DopplerConvention::Radio => rest * (1.0 - velocity / SPEED_OF_LIGHT),
            DopplerConvention::Optical => rest / (1.0 + velocity / SPEED_OF_LIGHT),
        }
    }
}

/// A velocity given either with physical units or as a bare number already
/// expressed in the cube's velocity unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VelocityValue {
    Physical(Velocity),
    Bare(f64),
}

impl VelocityValue {
    /// The value expressed in `unit`.
    pub fn in_unit(self, unit: VelocityUnit) -> f64 {
        match self {
            VelocityValue::Physical(v) => v.get::<meter_per_second>() / unit.scale(),
            VelocityValue::Bare(x) => x,
        }
    }
}

impl From<f64> for VelocityValue {
    fn from(x: f64) -> Self {
        VelocityValue::Bare(x)
    }
}

impl From<Velocity> for VelocityValue {
    fn from(v: Velocity) -> Self {
        VelocityValue::Physical(v)
    }
}

/// Angular area a flux density is measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluxGeometry {
    Beam,
    Pixel,
}

/// Units a cube's brightness can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrightnessUnit {
    JanskyPerBeam,
    MilliJanskyPerBeam,
    JanskyPerPixel,
    MilliJanskyPerPixel,
    Kelvin,
    MilliKelvin,
}

impl BrightnessUnit {
    /// Parse a `BUNIT` style string. Returns `None` for anything without a
    /// known conversion.
    pub fn parse(text: &str) -> Option<Self> {
        let normalized: String = text
            .trim()
            .to_ascii_lowercase()
            .split_whitespace()
            .collect();
        let unit = match normalized.as_str() {
            "jy/beam" | "jy/bm" | "jy.beam-1" => BrightnessUnit::JanskyPerBeam,
            "mjy/beam" | "mjy/bm" | "mjy.beam-1" => BrightnessUnit::MilliJanskyPerBeam,
            "jy/pixel" | "jy/pix" | "jy.pixel-1" => BrightnessUnit::JanskyPerPixel,
            "mjy/pixel" | "mjy/pix" | "mjy.pixel-1" => BrightnessUnit::MilliJanskyPerPixel,
            "k" | "kelvin" | "k(tb)" | "k(tmb)" => BrightnessUnit::Kelvin,
            "mk" => BrightnessUnit::MilliKelvin,
            _ => return None,
        };
        Some(unit)
    }

    /// Canonical string stored back into `BUNIT`.
    pub fn as_str(self) -> &'static str {
        match self {
            BrightnessUnit::JanskyPerBeam => "Jy/beam",
            BrightnessUnit::MilliJanskyPerBeam => "mJy/beam",
            BrightnessUnit::JanskyPerPixel => "Jy/pixel",
            BrightnessUnit::MilliJanskyPerPixel => "mJy/pixel",
            BrightnessUnit::Kelvin => "K",
            BrightnessUnit::MilliKelvin => "mK",
        }
    }

    /// Area the unit is a flux density per; `None` for temperatures.
    pub fn geometry(self) -> Option<FluxGeometry> {
        match self {
            BrightnessUnit::JanskyPerBeam | BrightnessUnit::MilliJanskyPerBeam => {
                Some(FluxGeometry::Beam)
            }
            BrightnessUnit::JanskyPerPixel | BrightnessUnit::MilliJanskyPerPixel => {
                Some(FluxGeometry::Pixel)
            }
            BrightnessUnit::Kelvin | BrightnessUnit::MilliKelvin => None,
        }
    }

    /// Factor to the base unit of the same kind (Jy or K).
    fn prefix(self) -> f64 {
        match self {
            BrightnessUnit::MilliJanskyPerBeam
            | BrightnessUnit::MilliJanskyPerPixel
            | BrightnessUnit::MilliKelvin => 1.0e-3,
            _ => 1.0,
        }
    }
}

impl fmt::Display for BrightnessUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rayleigh–Jeans factor: kelvin per (Jy/sr) at `frequency` Hz.
pub fn kelvin_per_jansky_steradian(frequency: f64) -> f64 {
    JANSKY * SPEED_OF_LIGHT * SPEED_OF_LIGHT / (2.0 * BOLTZMANN * frequency * frequency)
}

/// Parameters of the flux-density/temperature equivalence.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrightnessEquivalence {
    pub frequency: Option<Frequency>,
    pub beam: Option<SolidAngle>,
    pub pixel: Option<SolidAngle>,
}

/// A linear conversion and its inverse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionPair {
    factor: f64,
}

impl ConversionPair {
    /// Convert from the source unit to the target unit.
    pub fn forward(&self, x: f64) -> f64 {
        x * self.factor
    }

    /// Convert from the target unit back to the source unit.
    pub fn inverse(&self, x: f64) -> f64 {
        x / self.factor
    }

    /// Multiplier applied by [`ConversionPair::forward`].
    pub fn factor(&self) -> f64 {
        self.factor
    }
}

impl BrightnessEquivalence {
    /// Build the conversion pair between `from` and `to`.
    ///
    /// Flux densities pass through specific intensity (Jy/sr); the
    /// parameters needed for that path must be present.
    pub fn pair(&self, from: BrightnessUnit, to: BrightnessUnit) -> Result<ConversionPair> {
        if from.geometry() == to.geometry() {
            return Ok(ConversionPair {
                factor: from.prefix() / to.prefix(),
            });
        }
        let into_intensity = self.to_intensity(from)?;
        let from_intensity = self.to_intensity(to)?;
        Ok(ConversionPair {
            factor: into_intensity / from_intensity,
        })
    }

    /// Factor from `unit` to Jy/sr.
    fn to_intensity(&self, unit: BrightnessUnit) -> Result<f64> {
        let incompatible = || Error::IncompatibleUnit {
            from: unit.as_str().to_string(),
            to: "Jy/sr".to_string(),
        };
        let factor = match unit.geometry() {
            Some(FluxGeometry::Beam) => {
                let beam = self.beam.ok_or_else(incompatible)?;
                1.0 / beam.get::<steradian>()
            }
            Some(FluxGeometry::Pixel) => {
                let pixel = self.pixel.ok_or_else(incompatible)?;
                1.0 / pixel.get::<steradian>()
            }
            None => {
                let nu = self.frequency.ok_or_else(incompatible)?;
                1.0 / kelvin_per_jansky_steradian(nu.get::<hertz>())
            }
        };
        Ok(factor * unit.prefix())
    }
}
