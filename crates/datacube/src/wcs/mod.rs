//! World coordinate system derived from header keywords.
//!
//! Supports the subset a spectral-line cube needs: a linear spectral axis and
//! one celestial axis pair with a zenithal or cylindrical projection. Pixel
//! coordinates are 0-based at the public boundary (FITS `CRPIXn` is 1-based
//! and converted internally). Pixel and world vectors follow header axis
//! order, `NAXIS1` first.

mod projection;

pub use projection::{Projection, SphericalRotation};

use crate::error::{Error, Result};
use crate::header::Header;
use crate::units::{DopplerConvention, SpectralUnit, VelocityUnit};

/// Highest axis number scanned for WCS keywords.
const MAX_AXES: usize = 9;

const LONGITUDE_TYPES: [&str; 3] = ["RA", "GLON", "ELON"];
const LATITUDE_TYPES: [&str; 3] = ["DEC", "GLAT", "ELAT"];
const SPECTRAL_TYPES: [&str; 11] = [
    "FREQ", "VRAD", "VOPT", "FELO", "VELO", "WAVE", "AWAV", "ZOPT", "BETA", "ENER", "WAVN",
];

/// Which axes a conversion applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSubset {
    Full,
    Spectral,
    Celestial,
}

/// Convention of the spectral axis, from its declared CTYPE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralType {
    Frequency,
    RadioVelocity,
    OpticalVelocity,
}

impl SpectralType {
    /// Classify a spectral CTYPE by its four-character prefix.
    pub fn classify(ctype: &str) -> Result<Self> {
        match ctype_base(ctype).as_str() {
            "FREQ" => Ok(SpectralType::Frequency),
            "VRAD" => Ok(SpectralType::RadioVelocity),
            "VOPT" | "FELO" => Ok(SpectralType::OpticalVelocity),
            _ => Err(Error::UnsupportedSpectralType(ctype.trim().to_string())),
        }
    }

    /// Doppler convention of a velocity axis.
    pub fn doppler(self) -> Option<DopplerConvention> {
        match self {
            SpectralType::Frequency => None,
            SpectralType::RadioVelocity => Some(DopplerConvention::Radio),
            SpectralType::OpticalVelocity => Some(DopplerConvention::Optical),
        }
    }
}

/// Upper-cased CTYPE with the projection/frame suffix removed.
fn ctype_base(ctype: &str) -> String {
    ctype
        .trim()
        .split('-')
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

/// Linear keywords of one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct WcsAxis {
    pub ctype: String,
    pub cunit: String,
    /// 1-based reference pixel, as in the header.
    pub crpix: f64,
    pub crval: f64,
    /// Effective increment per pixel (`CDELTi · PCi_i` or `CDi_i`).
    pub scale: f64,
}

impl WcsAxis {
    fn pixel_to_world(&self, pixel: f64) -> f64 {
        self.crval + self.scale * (pixel + 1.0 - self.crpix)
    }

    fn world_to_pixel(&self, world: f64) -> f64 {
        (world - self.crval) / self.scale + self.crpix - 1.0
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CelestialFrame {
    lon: usize,
    lat: usize,
    projection: Projection,
    rotation: SphericalRotation,
    /// Pixel offsets (lon, lat) to intermediate coordinates in degrees.
    matrix: [[f64; 2]; 2],
    inverse: [[f64; 2]; 2],
}

impl CelestialFrame {
    fn pixel_to_sky(&self, axes: &[WcsAxis], p_lon: f64, p_lat: f64) -> (f64, f64) {
        let u = p_lon + 1.0 - axes[self.lon].crpix;
        let v = p_lat + 1.0 - axes[self.lat].crpix;
        let x = self.matrix[0][0] * u + self.matrix[0][1] * v;
        let y = self.matrix[1][0] * u + self.matrix[1][1] * v;
        match self.projection.to_native(x, y) {
            Some((phi, theta)) => self.rotation.to_celestial(phi, theta),
            None => (f64::NAN, f64::NAN),
        }
    }

    fn sky_to_pixel(&self, axes: &[WcsAxis], lon: f64, lat: f64) -> (f64, f64) {
        let (phi, theta) = self.rotation.to_native(lon, lat);
        let Some((x, y)) = self.projection.to_plane(phi, theta) else {
            return (f64::NAN, f64::NAN);
        };
        let u = self.inverse[0][0] * x + self.inverse[0][1] * y;
        let v = self.inverse[1][0] * x + self.inverse[1][1] * y;
        (
            u + axes[self.lon].crpix - 1.0,
            v + axes[self.lat].crpix - 1.0,
        )
    }
}

/// Coordinate system of a cube, a pure function of its header.
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    axes: Vec<WcsAxis>,
    spectral: Option<usize>,
    celestial: Option<CelestialFrame>,
}

impl Wcs {
    /// Build the coordinate system from header keywords. Missing keywords
    /// take the FITS defaults.
    pub fn from_header(header: &Header) -> Result<Self> {
        let naxis = count_axes(header);
        // CD applies per axis; an axis with no CDi_j card keeps CDELTi * PCi_j.
        let has_cd: Vec<bool> = (1..=naxis)
            .map(|i| (1..=naxis).any(|j| header.contains(&format!("CD{i}_{j}"))))
            .collect();

        let element = |i: usize, j: usize| -> f64 {
            if has_cd[i - 1] {
                header.float_or(&format!("CD{i}_{j}"), 0.0)
            } else {
                let pc = header.float_or(&format!("PC{i}_{j}"), if i == j { 1.0 } else { 0.0 });
                header.float_or(&format!("CDELT{i}"), 1.0) * pc
            }
        };

        let axes: Vec<WcsAxis> = (1..=naxis)
            .map(|i| WcsAxis {
                ctype: header.str_or_empty(&format!("CTYPE{i}")).to_string(),
                cunit: header.str_or_empty(&format!("CUNIT{i}")).to_string(),
                crpix: header.float_or(&format!("CRPIX{i}"), 0.0),
                crval: header.float_or(&format!("CRVAL{i}"), 0.0),
                scale: element(i, i),
            })
            .collect();

        let lon = axes
            .iter()
            .position(|a| LONGITUDE_TYPES.contains(&ctype_base(&a.ctype).as_str()));
        let lat = axes
            .iter()
            .position(|a| LATITUDE_TYPES.contains(&ctype_base(&a.ctype).as_str()));

        let celestial = match (lon, lat) {
            (Some(lon), Some(lat)) => {
                let projection =
                    Projection::from_ctype(&axes[lon].ctype).unwrap_or(Projection::Car);
                let matrix = [
                    [element(lon + 1, lon + 1), element(lon + 1, lat + 1)],
                    [element(lat + 1, lon + 1), element(lat + 1, lat + 1)],
                ];
                let det = matrix[0][0] * matrix[1][1] - matrix[0][1] * matrix[1][0];
                if det == 0.0 {
                    return Err(Error::InvalidHeader("singular celestial matrix"));
                }
                let inverse = [
                    [matrix[1][1] / det, -matrix[0][1] / det],
                    [-matrix[1][0] / det, matrix[0][0] / det],
                ];
                let lonpole = header.get("LONPOLE").and_then(|v| v.as_f64());
                let latpole = header.float_or("LATPOLE", 90.0);
                let rotation = SphericalRotation::new(
                    axes[lon].crval,
                    axes[lat].crval,
                    projection.theta0(),
                    lonpole,
                    latpole,
                );
                Some(CelestialFrame {
                    lon,
                    lat,
                    projection,
                    rotation,
                    matrix,
                    inverse,
                })
            }
            _ => None,
        };

        let spectral = axes.iter().enumerate().position(|(i, a)| {
            let is_celestial = celestial
                .as_ref()
                .map(|c| c.lon == i || c.lat == i)
                .unwrap_or(false);
            !is_celestial && SPECTRAL_TYPES.contains(&ctype_base(&a.ctype).as_str())
        });

        if axes.iter().any(|a| a.scale == 0.0) {
            return Err(Error::InvalidHeader("zero axis increment"));
        }

        Ok(Wcs {
            axes,
            spectral,
            celestial,
        })
    }

    /// Number of WCS axes.
    pub fn naxis(&self) -> usize {
        self.axes.len()
    }

    /// 0-based header position of the spectral axis.
    pub fn spectral_axis(&self) -> Option<usize> {
        self.spectral
    }

    /// 0-based header positions of the (longitude, latitude) axes.
    pub fn celestial_axes(&self) -> Option<[usize; 2]> {
        self.celestial.as_ref().map(|c| [c.lon, c.lat])
    }

    /// Celestial projection, if the header has a sky pair.
    pub fn projection(&self) -> Option<Projection> {
        self.celestial.as_ref().map(|c| c.projection)
    }

    fn require_spectral(&self) -> Result<&WcsAxis> {
        self.spectral
            .map(|i| &self.axes[i])
            .ok_or(Error::MissingAxis("spectral"))
    }

    fn require_celestial(&self) -> Result<&CelestialFrame> {
        self.celestial
            .as_ref()
            .ok_or(Error::MissingAxis("celestial"))
    }

    /// Classify the spectral axis convention.
    pub fn spectral_axis_type(&self) -> Result<SpectralType> {
        SpectralType::classify(&self.require_spectral()?.ctype)
    }

    /// Unit of the spectral axis; defaults to Hz or m/s when `CUNITn` is
    /// absent.
    pub fn spectral_unit(&self) -> Result<SpectralUnit> {
        let axis = self.require_spectral()?;
        if !axis.cunit.trim().is_empty() {
            return SpectralUnit::parse(&axis.cunit);
        }
        Ok(match self.spectral_axis_type()? {
            SpectralType::Frequency => SpectralUnit::Frequency(crate::units::FrequencyUnit::Hertz),
            _ => SpectralUnit::Velocity(VelocityUnit::MetrePerSecond),
        })
    }

    /// Per-axis unit strings, celestial axes defaulting to degrees.
    pub fn axis_units(&self) -> Vec<&str> {
        self.axes
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let celestial = self.celestial_axes().is_some_and(|c| c.contains(&i));
                if a.cunit.is_empty() && celestial {
                    "deg"
                } else {
                    a.cunit.as_str()
                }
            })
            .collect()
    }

    /// Convert 0-based pixel coordinates to world coordinates.
    pub fn pixel_to_world(&self, subset: AxisSubset, pixel: &[f64]) -> Result<Vec<f64>> {
        self.transform(subset, pixel, true)
    }

    /// Convert world coordinates to 0-based pixel coordinates.
    pub fn world_to_pixel(&self, subset: AxisSubset, world: &[f64]) -> Result<Vec<f64>> {
        self.transform(subset, world, false)
    }

    fn transform(&self, subset: AxisSubset, input: &[f64], forward: bool) -> Result<Vec<f64>> {
        let expected = match subset {
            AxisSubset::Full => self.naxis(),
            AxisSubset::Spectral => 1,
            AxisSubset::Celestial => 2,
        };
        if input.len() != expected {
            return Err(Error::ShapeMismatch {
                expected: vec![expected],
                found: vec![input.len()],
            });
        }

        match subset {
            AxisSubset::Spectral => {
                let axis = self.require_spectral()?;
                Ok(vec![linear(axis, input[0], forward)])
            }
            AxisSubset::Celestial => {
                let frame = self.require_celestial()?;
                // header order of the pair; longitude may come second
                let (a, b) = if frame.lon < frame.lat {
                    (input[0], input[1])
                } else {
                    (input[1], input[0])
                };
                let (lon, lat) = self.celestial_pair(frame, a, b, forward);
                Ok(if frame.lon < frame.lat {
                    vec![lon, lat]
                } else {
                    vec![lat, lon]
                })
            }
            AxisSubset::Full => {
                let mut out: Vec<f64> = self
                    .axes
                    .iter()
                    .zip(input)
                    .map(|(axis, &v)| linear(axis, v, forward))
                    .collect();
                if let Some(frame) = &self.celestial {
                    let (lon, lat) =
                        self.celestial_pair(frame, input[frame.lon], input[frame.lat], forward);
                    out[frame.lon] = lon;
                    out[frame.lat] = lat;
                }
                Ok(out)
            }
        }
    }

    fn celestial_pair(
        &self,
        frame: &CelestialFrame,
        lon_value: f64,
        lat_value: f64,
        forward: bool,
    ) -> (f64, f64) {
        if forward {
            frame.pixel_to_sky(&self.axes, lon_value, lat_value)
        } else {
            frame.sky_to_pixel(&self.axes, lon_value, lat_value)
        }
    }

    /// World coordinate of a 0-based spectral pixel.
    pub fn spectral_pixel_to_world(&self, pixel: f64) -> Result<f64> {
        Ok(self.require_spectral()?.pixel_to_world(pixel))
    }

    /// Pixel `(x, y)` along the longitude and latitude axes for a sky
    /// position in the cube's own frame, in degrees.
    pub fn sky_to_pixel(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        let frame = self.require_celestial()?;
        Ok(frame.sky_to_pixel(&self.axes, lon, lat))
    }

    /// Sky position in degrees at 0-based pixel `(x, y)`.
    pub fn pixel_to_sky(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let frame = self.require_celestial()?;
        Ok(frame.pixel_to_sky(&self.axes, x, y))
    }
}

fn linear(axis: &WcsAxis, value: f64, forward: bool) -> f64 {
    if forward {
        axis.pixel_to_world(value)
    } else {
        axis.world_to_pixel(value)
    }
}

/// Number of axes described by the header: the larger of `NAXIS`,
/// `WCSAXES` and the highest-numbered axis with WCS keywords.
fn count_axes(header: &Header) -> usize {
    let declared = ["NAXIS", "WCSAXES"]
        .iter()
        .filter_map(|k| header.get(k).and_then(|v| v.as_i64()))
        .max()
        .unwrap_or(0)
        .max(0) as usize;
    let described = (1..=MAX_AXES)
        .rev()
        .find(|i| {
            ["CTYPE", "CRPIX", "CRVAL", "CDELT", "CUNIT"]
                .iter()
                .any(|k| header.contains(&format!("{k}{i}")))
        })
        .unwrap_or(0);
    declared.max(described)
}
