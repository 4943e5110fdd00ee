//! Moment maps: integrated intensity and intensity-weighted mean velocity
//! over a spectral range, with an optional weight mask. Missing samples
//! (NaN) are skipped.

use core::ops::Range;
use std::sync::Arc;

use ndarray::{
    Array1, Array2, ArrayView2, ArrayView3, ArrayViewD, Axis, Ix2, Ix3, RemoveAxis, Zip,
};

use crate::channels::ChannelResolver;
use crate::element::CubeElement;
use crate::error::{Error, Result};
use crate::units::{VelocityUnit, VelocityValue};
use crate::wcs::Wcs;

/// The capabilities moment and spectrum extraction need from a cube.
pub trait SpectralCube {
    type Elem: CubeElement;

    fn data(&self) -> ArrayView3<'_, Self::Elem>;

    fn wcs(&self) -> Result<Arc<Wcs>>;

    /// Per-channel velocities under the radio convention.
    fn radio_velocities(&self) -> Result<Arc<Array1<f64>>>;

    /// Unit of [`SpectralCube::radio_velocities`].
    fn velocity_unit(&self) -> Result<VelocityUnit>;

    /// Array axis running along the spectrum. FITS axis `i` (0-based) is
    /// array axis `2 - i`.
    fn spectral_array_axis(&self) -> Result<Axis> {
        let index = self
            .wcs()?
            .spectral_axis()
            .ok_or(Error::MissingAxis("spectral"))?;
        if index > 2 {
            return Err(Error::MissingAxis("spectral"));
        }
        Ok(Axis(2 - index))
    }
}

/// Which channels a moment is taken over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpectralSelection {
    /// Velocity interval; both ends are included.
    Velocities(VelocityValue, VelocityValue),
    /// Fractional channel interval, widened to whole channels.
    Channels(f64, f64),
}

impl SpectralSelection {
    /// Velocity interval `[a, b]` in either order.
    pub fn velocities(a: impl Into<VelocityValue>, b: impl Into<VelocityValue>) -> Self {
        SpectralSelection::Velocities(a.into(), b.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomentKind {
    /// Moment 0.
    Integrated,
    /// Moment 1.
    MeanVelocity,
}

impl TryFrom<u8> for MomentKind {
    type Error = Error;

    fn try_from(order: u8) -> Result<Self> {
        match order {
            0 => Ok(MomentKind::Integrated),
            1 => Ok(MomentKind::MeanVelocity),
            other => Err(Error::UnsupportedMoment(other)),
        }
    }
}

/// A weight mask, either one spatial plane broadcast over channels or a
/// full cube. The shape is checked against the cube when used.
#[derive(Debug, Clone)]
pub struct Mask<'a> {
    weights: ArrayViewD<'a, f64>,
}

impl<'a> Mask<'a> {
    /// Wrap mask weights of any dimensionality.
    pub fn new(weights: ArrayViewD<'a, f64>) -> Self {
        Mask { weights }
    }

    /// Shape of the weights.
    pub fn shape(&self) -> &[usize] {
        self.weights.shape()
    }
}

impl<'a> From<ArrayView2<'a, f64>> for Mask<'a> {
    fn from(view: ArrayView2<'a, f64>) -> Self {
        Mask::new(view.into_dyn())
    }
}

impl<'a> From<ArrayView3<'a, f64>> for Mask<'a> {
    fn from(view: ArrayView3<'a, f64>) -> Self {
        Mask::new(view.into_dyn())
    }
}

impl<'a> From<ArrayViewD<'a, f64>> for Mask<'a> {
    fn from(view: ArrayViewD<'a, f64>) -> Self {
        Mask::new(view)
    }
}

impl<'a> From<&'a Array2<f64>> for Mask<'a> {
    fn from(array: &'a Array2<f64>) -> Self {
        Mask::from(array.view())
    }
}

impl<'a> From<&'a ndarray::Array3<f64>> for Mask<'a> {
    fn from(array: &'a ndarray::Array3<f64>) -> Self {
        Mask::from(array.view())
    }
}

/// Mask resolved against a cube.
pub(crate) enum Weights<'a> {
    Unit,
    Plane(ArrayView2<'a, f64>),
    Volume(ArrayView3<'a, f64>),
}

impl<'a> Weights<'a> {
    /// Validate `mask` against a cube of `shape` whose spectrum runs along
    /// `spectral`.
    pub(crate) fn resolve(mask: Option<&Mask<'a>>, shape: &[usize], spectral: Axis) -> Result<Self> {
        let Some(mask) = mask else {
            return Ok(Weights::Unit);
        };
        let plane: Vec<usize> = shape
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != spectral.index())
            .map(|(_, &n)| n)
            .collect();
        let found = mask.shape();
        if found == plane.as_slice() {
            if let Ok(view) = mask.weights.clone().into_dimensionality::<Ix2>() {
                return Ok(Weights::Plane(view));
            }
        }
        if found == shape {
            if let Ok(view) = mask.weights.clone().into_dimensionality::<Ix3>() {
                return Ok(Weights::Volume(view));
            }
        }
        Err(Error::IncompatibleMaskShape {
            found: found.to_vec(),
            plane,
            cube: shape.to_vec(),
        })
    }

    /// Weight plane for channel `k`; `None` means unit weight.
    pub(crate) fn channel(&self, spectral: Axis, k: usize) -> Option<ArrayView2<'_, f64>> {
        match self {
            Weights::Unit => None,
            Weights::Plane(p) => Some(p.view()),
            Weights::Volume(v) => Some(v.index_axis(spectral, k)),
        }
    }
}

fn to_f64<T: CubeElement>(x: T) -> f64 {
    x.to_f64().unwrap_or(f64::NAN)
}

/// Resolve a selection to a half-open channel range within `[0, N]`.
pub fn channel_range<C>(cube: &C, selection: SpectralSelection) -> Result<Range<usize>>
where
    C: SpectralCube + ?Sized,
{
    let axis = cube.spectral_array_axis()?;
    let n = cube.data().len_of(axis);
    match selection {
        SpectralSelection::Channels(a, b) => {
            let (a, b) = if a <= b { (a, b) } else { (b, a) };
            let lo = a.floor().clamp(0.0, n as f64) as usize;
            let hi = b.ceil().clamp(0.0, n as f64) as usize;
            Ok(lo..hi.max(lo))
        }
        SpectralSelection::Velocities(a, b) => {
            let velocities = cube.radio_velocities()?;
            let resolver = ChannelResolver::new(velocities.view(), cube.velocity_unit()?);
            Ok(resolver.range(a, b))
        }
    }
}

/// Compute a moment map over `selection`.
///
/// Moment 0 is the NaN-skipping sum of `data * mask` along the spectrum;
/// moment 1 divides the velocity-weighted sum by moment 0, giving NaN where
/// moment 0 is zero.
pub fn moment<C>(
    cube: &C,
    selection: SpectralSelection,
    kind: MomentKind,
    mask: Option<&Mask<'_>>,
) -> Result<Array2<f64>>
where
    C: SpectralCube + ?Sized,
{
    let data = cube.data();
    let axis = cube.spectral_array_axis()?;
    let weights = Weights::resolve(mask, data.shape(), axis)?;
    let range = channel_range(cube, selection)?;

    let plane_dim = data.raw_dim().remove_axis(axis);
    let ones = Array2::<f64>::ones(plane_dim);
    let mut m0 = Array2::<f64>::zeros(plane_dim);
    let mut m1 = Array2::<f64>::zeros(plane_dim);

    let velocities = match kind {
        MomentKind::MeanVelocity => Some(cube.radio_velocities()?),
        MomentKind::Integrated => None,
    };

    for k in range {
        let plane = data.index_axis(axis, k);
        let w = weights.channel(axis, k).unwrap_or_else(|| ones.view());
        let v = velocities.as_ref().map_or(0.0, |vel| vel[k]);
        Zip::from(&mut m0)
            .and(&mut m1)
            .and(&plane)
            .and(&w)
            .for_each(|s0, s1, &d, &w| {
                let x = to_f64(d) * w;
                if !x.is_nan() {
                    *s0 += x;
                }
                let xv = x * v;
                if !xv.is_nan() {
                    *s1 += xv;
                }
            });
    }

    Ok(match kind {
        MomentKind::Integrated => m0,
        MomentKind::MeanVelocity => {
            Zip::from(&mut m1).and(&m0).for_each(|s1, &s0| {
                *s1 = if s0 == 0.0 { f64::NAN } else { *s1 / s0 };
            });
            m1
        }
    })
}
