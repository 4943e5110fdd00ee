//! Spectrum extraction: the spectrum under a sky position and the
//! mask-weighted spectrum summed over the image plane.

use ndarray::{Array1, Array2, RemoveAxis, Zip};
use num_traits::ToPrimitive;

use crate::error::{Error, Result};
use crate::moments::{Mask, SpectralCube, Weights};

/// Spectrum at the pixel nearest to `(lon, lat)`, given in degrees in the
/// cube's own celestial frame.
pub fn pixel_spectrum<C>(cube: &C, lon: f64, lat: f64) -> Result<Array1<f64>>
where
    C: SpectralCube + ?Sized,
{
    let wcs = cube.wcs()?;
    let [lon_axis, lat_axis] = wcs
        .celestial_axes()
        .ok_or(Error::MissingAxis("celestial"))?;
    let spectral = cube.spectral_array_axis()?;
    let (x, y) = wcs.sky_to_pixel(lon, lat)?;

    let data = cube.data();
    let shape = data.shape();
    if lon_axis > 2 || lat_axis > 2 {
        return Err(Error::MissingAxis("celestial"));
    }
    let (x_axis, y_axis) = (2 - lon_axis, 2 - lat_axis);
    let (xi, yi) = (x.round(), y.round());
    let inside = |p: f64, len: usize| p.is_finite() && p >= 0.0 && p < len as f64;
    if !inside(xi, shape[x_axis]) || !inside(yi, shape[y_axis]) {
        return Err(Error::OutOfBounds { x, y });
    }

    let mut index = [0usize; 3];
    index[x_axis] = xi as usize;
    index[y_axis] = yi as usize;
    let spectrum = (0..data.len_of(spectral))
        .map(|k| {
            index[spectral.index()] = k;
            data[index].to_f64().unwrap_or(f64::NAN)
        })
        .collect();
    Ok(spectrum)
}

/// [`pixel_spectrum`] for several positions; fails on the first position
/// outside the image.
pub fn pixel_spectra<C>(cube: &C, positions: &[(f64, f64)]) -> Result<Vec<Array1<f64>>>
where
    C: SpectralCube + ?Sized,
{
    positions
        .iter()
        .map(|&(lon, lat)| pixel_spectrum(cube, lon, lat))
        .collect()
}

/// Per-channel sum of `data * mask` over the image plane, skipping NaN.
pub fn integrated_spectrum<C>(cube: &C, mask: Option<&Mask<'_>>) -> Result<Array1<f64>>
where
    C: SpectralCube + ?Sized,
{
    let data = cube.data();
    let axis = cube.spectral_array_axis()?;
    let weights = Weights::resolve(mask, data.shape(), axis)?;
    let ones = Array2::<f64>::ones(data.raw_dim().remove_axis(axis));

    let spectrum = (0..data.len_of(axis))
        .map(|k| {
            let plane = data.index_axis(axis, k);
            let w = weights.channel(axis, k).unwrap_or_else(|| ones.view());
            let mut sum = 0.0;
            Zip::from(&plane).and(&w).for_each(|&d, &w| {
                let x = d.to_f64().unwrap_or(f64::NAN) * w;
                if !x.is_nan() {
                    sum += x;
                }
            });
            sum
        })
        .collect();
    Ok(spectrum)
}
