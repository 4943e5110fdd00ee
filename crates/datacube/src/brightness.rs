//! In-place conversion of cube brightness between flux density per beam or
//! pixel and brightness temperature.

use ndarray::Array3;
use tracing::info;

use crate::element::CubeElement;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::units::{BrightnessEquivalence, BrightnessUnit, FluxGeometry};

/// Equivalence parameters needed to go between `from` and `to`, read from
/// the header. Only the keywords the path actually uses are required.
fn equivalence_for(
    header: &Header,
    from: BrightnessUnit,
    to: BrightnessUnit,
) -> Result<BrightnessEquivalence> {
    let mut eq = BrightnessEquivalence::default();
    if from.geometry() == to.geometry() {
        return Ok(eq);
    }
    let geometries = [from.geometry(), to.geometry()];
    if geometries.contains(&None) {
        eq.frequency = Some(header.rest_frequency()?);
    }
    if geometries.contains(&Some(FluxGeometry::Beam)) {
        eq.beam = Some(header.beam_solid_angle()?);
    }
    if geometries.contains(&Some(FluxGeometry::Pixel)) {
        eq.pixel = Some(header.pixel_solid_angle()?);
    }
    Ok(eq)
}

/// Convert `data` from the unit in `BUNIT` to `target`, then store the
/// canonical unit string in `BUNIT`. On error nothing is modified.
pub fn convert<T: CubeElement>(data: &mut Array3<T>, header: &mut Header, target: &str) -> Result<()> {
    let current = header.brightness_unit()?.to_string();
    let incompatible = || Error::IncompatibleUnit {
        from: current.clone(),
        to: target.trim().to_string(),
    };
    let from = BrightnessUnit::parse(&current).ok_or_else(incompatible)?;
    let to = BrightnessUnit::parse(target).ok_or_else(incompatible)?;

    let pair = equivalence_for(header, from, to)?.pair(from, to)?;
    data.mapv_inplace(|x| T::cast_from(pair.forward(x.to_f64().unwrap_or(f64::NAN))));
    header.set("BUNIT", to.as_str());
    info!(%from, %to, factor = pair.factor(), "converted brightness unit");
    Ok(())
}
