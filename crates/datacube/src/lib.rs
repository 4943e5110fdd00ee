//! Spectral-line astronomy datacubes.
//!
//! A [`Datacube`] pairs a `(spectral, y, x)` array with its header and
//! derives per-channel frequencies and velocities from the world coordinate
//! system. On top of that it computes moment maps over velocity or channel
//! ranges, extracts spectra, and converts the brightness unit between
//! Jy/beam, Jy/pixel and kelvin.
//!
//! ```no_run
//! use datacube::{Datacube, MomentKind, SpectralSelection};
//!
//! # fn main() -> datacube::Result<()> {
//! let cube: Datacube = Datacube::open("cube.fits")?;
//! let map = cube.moment(
//!     SpectralSelection::velocities(-45.0, -25.0),
//!     MomentKind::Integrated,
//!     None,
//! )?;
//! println!("{:?}", map.dim());
//! # Ok(())
//! # }
//! ```

pub mod axes;
pub mod brightness;
pub mod channels;
pub mod cube;
pub mod element;
pub mod error;
#[cfg(feature = "fits")]
pub mod fits;
pub mod header;
pub mod moments;
pub mod preset;
pub mod source;
pub mod spectra;
pub mod units;
pub mod wcs;

pub use channels::{ChannelResolver, ResolvedChannels};
pub use cube::{CubeOptions, Datacube};
pub use element::CubeElement;
pub use error::{Error, Result};
pub use header::{Card, Header, Value};
pub use moments::{Mask, MomentKind, SpectralCube, SpectralSelection};
pub use preset::HeaderPreset;
pub use source::{CubeReader, CubeSource};
pub use units::{BrightnessUnit, DopplerConvention, VelocityUnit, VelocityValue};
pub use wcs::{AxisSubset, SpectralType, Wcs};

#[cfg(feature = "fits")]
pub use fits::FitsReader;
