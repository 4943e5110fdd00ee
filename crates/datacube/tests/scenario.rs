//! End-to-end behaviour of in-memory cubes: velocity slicing in either axis
//! direction, masks, cache invalidation and brightness conversion.

use std::sync::Arc;

use approx::assert_relative_eq;
use datacube::{
    CubeOptions, CubeSource, Datacube, Error, Header, Mask, MomentKind, SpectralSelection, Value,
    VelocityUnit,
};
use ndarray::{s, Array2, Array3};
use uom::si::f64::Velocity;
use uom::si::velocity::kilometer_per_second;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// 10 channels over a 4x4 plane with a linear VRAD axis in km/s.
fn header(crval3: f64, cdelt3: f64) -> Header {
    [
        ("NAXIS", Value::from(3)),
        ("NAXIS1", Value::from(4)),
        ("NAXIS2", Value::from(4)),
        ("NAXIS3", Value::from(10)),
        ("CTYPE1", Value::from("GLON-CAR")),
        ("CRPIX1", Value::from(2.5)),
        ("CRVAL1", Value::from(30.0)),
        ("CDELT1", Value::from(-0.05)),
        ("CTYPE2", Value::from("GLAT-CAR")),
        ("CRPIX2", Value::from(2.5)),
        ("CRVAL2", Value::from(0.0)),
        ("CDELT2", Value::from(0.05)),
        ("CTYPE3", Value::from("VRAD")),
        ("CUNIT3", Value::from("km/s")),
        ("CRPIX3", Value::from(1.0)),
        ("CRVAL3", Value::from(crval3)),
        ("CDELT3", Value::from(cdelt3)),
        ("RESTFRQ", Value::from(115.2712018e9)),
        ("BUNIT", Value::from("K")),
        ("BMAJ", Value::from(0.05)),
        ("BMIN", Value::from(0.05)),
    ]
    .into_iter()
    .collect()
}

fn unit_cube(crval3: f64, cdelt3: f64) -> Datacube {
    let source = CubeSource::from_parts(Array3::ones((10, 4, 4)), header(crval3, cdelt3));
    Datacube::new(source, CubeOptions::default()).unwrap()
}

fn ascending() -> Datacube {
    unit_cube(-50.0, 10.0)
}

fn descending() -> Datacube {
    unit_cube(40.0, -10.0)
}

// ---------------------------------------------------------------------------
// Velocity slicing
// ---------------------------------------------------------------------------

#[test]
fn integrated_map_over_velocity_range() {
    for cube in [ascending(), descending()] {
        let map = cube
            .moment(
                SpectralSelection::velocities(-45.0, -25.0),
                MomentKind::Integrated,
                None,
            )
            .unwrap();
        assert_eq!(map.dim(), (4, 4));
        assert!(map.iter().all(|&x| x == 3.0));
    }
}

#[test]
fn channel_lookup_reports_true_velocities() {
    let cube = ascending();
    let resolved = cube.channels_for_velocities(&[-45.0, -25.0]).unwrap();
    assert_eq!(resolved.channels, vec![1, 3]);
    assert_eq!(resolved.velocities, vec![-40.0, -20.0]);

    let cube = descending();
    let resolved = cube.channels_for_velocities(&[-45.0, -25.0]).unwrap();
    assert_eq!(resolved.channels, vec![8, 6]);
    assert_eq!(resolved.velocities, vec![-40.0, -20.0]);
}

#[test]
fn physical_velocities_match_bare_numbers() {
    let cube = ascending();
    let physical = [
        Velocity::new::<kilometer_per_second>(-45.0),
        Velocity::new::<kilometer_per_second>(-25.0),
    ];
    let resolved = cube.channels_for_velocities(&physical).unwrap();
    assert_eq!(resolved.channels, vec![1, 3]);
}

#[test]
fn exact_channel_velocities_round_trip() {
    for cube in [ascending(), descending()] {
        let velocities = cube.velocities().unwrap();
        let resolved = cube.channels_for_velocities(velocities.as_slice().unwrap()).unwrap();
        assert_eq!(resolved.channels, (0..10).collect::<Vec<_>>());
    }
}

#[test]
fn order_of_moment_is_checked() {
    assert!(matches!(
        MomentKind::try_from(3),
        Err(Error::UnsupportedMoment(3))
    ));
}

#[test]
fn cd_celestial_pair_with_cdelt_spectral_axis() {
    let header: Header = [
        ("CTYPE1", Value::from("RA---TAN")),
        ("CTYPE2", Value::from("DEC--TAN")),
        ("CD1_1", Value::from(-0.01)),
        ("CD2_2", Value::from(0.01)),
        ("CTYPE3", Value::from("VRAD")),
        ("CUNIT3", Value::from("km/s")),
        ("CRPIX3", Value::from(1.0)),
        ("CRVAL3", Value::from(-50.0)),
        ("CDELT3", Value::from(10.0)),
    ]
    .into_iter()
    .collect();
    let cube: Datacube =
        Datacube::from_parts(Array3::ones((10, 4, 4)), header, CubeOptions::default()).unwrap();
    let v = cube.velocities().unwrap();
    assert_eq!(v.len(), 10);
    assert_relative_eq!(v[0], -50.0);
    assert_relative_eq!(v[9], 40.0);
    let map = cube
        .moment(
            SpectralSelection::velocities(-45.0, -25.0),
            MomentKind::Integrated,
            None,
        )
        .unwrap();
    assert!(map.iter().all(|&x| x == 3.0));
}

// ---------------------------------------------------------------------------
// Spectral axis first in the header
// ---------------------------------------------------------------------------

/// 10 channels on NAXIS1, a 3x4 sky plane on NAXIS2/NAXIS3; array shape
/// (4, 3, 10).
fn spectral_first() -> Datacube {
    let header: Header = [
        ("NAXIS", Value::from(3)),
        ("NAXIS1", Value::from(10)),
        ("NAXIS2", Value::from(3)),
        ("NAXIS3", Value::from(4)),
        ("CTYPE1", Value::from("VRAD")),
        ("CUNIT1", Value::from("km/s")),
        ("CRPIX1", Value::from(1.0)),
        ("CRVAL1", Value::from(-50.0)),
        ("CDELT1", Value::from(10.0)),
        ("CTYPE2", Value::from("RA---CAR")),
        ("CRPIX2", Value::from(2.0)),
        ("CRVAL2", Value::from(10.0)),
        ("CDELT2", Value::from(-0.1)),
        ("CTYPE3", Value::from("DEC--CAR")),
        ("CRPIX3", Value::from(2.0)),
        ("CRVAL3", Value::from(0.0)),
        ("CDELT3", Value::from(0.1)),
        ("RESTFRQ", Value::from(115.2712018e9)),
    ]
    .into_iter()
    .collect();
    Datacube::from_parts(Array3::ones((4, 3, 10)), header, CubeOptions::default()).unwrap()
}

#[test]
fn spectral_axis_located_through_wcs() {
    let cube = spectral_first();
    assert_eq!(cube.channels().unwrap(), 10);
    assert_eq!(cube.frequencies().unwrap().len(), 10);

    let resolved = cube.channels_for_velocities(&[-45.0, -25.0]).unwrap();
    assert_eq!(resolved.channels, vec![1, 3]);

    let map = cube
        .moment(
            SpectralSelection::velocities(-45.0, -25.0),
            MomentKind::Integrated,
            None,
        )
        .unwrap();
    assert_eq!(map.dim(), (4, 3));
    assert!(map.iter().all(|&x| x == 3.0));

    let spectrum = cube.integrated_spectrum(None).unwrap();
    assert_eq!(spectrum.len(), 10);
    assert!(spectrum.iter().all(|&x| x == 12.0));
}

#[test]
fn spectral_axis_first_with_masks() {
    let cube = spectral_first();

    let plane = Array2::<f64>::ones((4, 3));
    let m1 = cube
        .moment(
            SpectralSelection::Channels(0.0, 10.0),
            MomentKind::MeanVelocity,
            Some(&Mask::from(&plane)),
        )
        .unwrap();
    assert_eq!(m1.dim(), (4, 3));
    assert!(m1.iter().all(|&v| (v + 5.0).abs() < 1e-12));

    let mut volume = Array3::<f64>::zeros((4, 3, 10));
    volume.slice_mut(s![.., .., 7]).fill(1.0);
    let m1 = cube
        .moment(
            SpectralSelection::Channels(0.0, 10.0),
            MomentKind::MeanVelocity,
            Some(&Mask::from(&volume)),
        )
        .unwrap();
    assert!(m1.iter().all(|&v| (v - 20.0).abs() < 1e-12));

    // the (spectral, y, x) plane shape belongs to the other layout
    let wrong = Array2::<f64>::ones((3, 10));
    assert!(matches!(
        cube.moment(
            SpectralSelection::Channels(0.0, 10.0),
            MomentKind::Integrated,
            Some(&Mask::from(&wrong)),
        ),
        Err(Error::IncompatibleMaskShape { .. })
    ));
}

// ---------------------------------------------------------------------------
// Masks
// ---------------------------------------------------------------------------

#[test]
fn plane_and_volume_masks() {
    let cube = ascending();
    let mut plane = Array2::<f64>::zeros((4, 4));
    plane[[0, 0]] = 1.0;
    let map = cube
        .moment(
            SpectralSelection::Channels(0.0, 10.0),
            MomentKind::Integrated,
            Some(&Mask::from(&plane)),
        )
        .unwrap();
    assert_eq!(map[[0, 0]], 10.0);
    assert_eq!(map[[3, 3]], 0.0);

    let mut volume = Array3::<f64>::zeros((10, 4, 4));
    volume.slice_mut(s![7, .., ..]).fill(1.0);
    let m1 = cube
        .moment(
            SpectralSelection::Channels(0.0, 10.0),
            MomentKind::MeanVelocity,
            Some(&Mask::from(&volume)),
        )
        .unwrap();
    assert!(m1.iter().all(|&v| (v - 20.0).abs() < 1e-12));
}

#[test]
fn mismatched_mask_is_rejected_before_slicing() {
    let cube = ascending();
    let mask = Array3::<f64>::ones((9, 4, 4));
    let err = cube
        .moment(
            SpectralSelection::velocities(-45.0, -25.0),
            MomentKind::Integrated,
            Some(&Mask::from(&mask)),
        )
        .unwrap_err();
    assert!(matches!(err, Error::IncompatibleMaskShape { .. }));
}

// ---------------------------------------------------------------------------
// Derived axes and caching
// ---------------------------------------------------------------------------

#[test]
fn derived_axes_are_cached_until_header_changes() {
    let mut cube = ascending();
    let a = cube.radio_velocities().unwrap();
    let b = cube.radio_velocities().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cube.velocity_unit().unwrap(), VelocityUnit::KilometrePerSecond);

    cube.header_mut().set("CTYPE3", "FREQ");
    cube.header_mut().set("CUNIT3", "Hz");
    cube.header_mut().set("CRVAL3", 115.2e9);
    cube.header_mut().set("CDELT3", 1.0e6);
    let after = cube.radio_velocities().unwrap();
    assert!(!Arc::ptr_eq(&a, &after));
    assert_eq!(cube.velocity_unit().unwrap(), VelocityUnit::KilometrePerSecond);
    let rest = 115.2712018e9;
    let expected = 299_792_458.0 * (rest - 115.2e9) / rest / 1.0e3;
    assert_relative_eq!(after[0], expected, max_relative = 1e-12);
}

#[test]
fn unsupported_spectral_type_after_edit() {
    let mut cube = ascending();
    cube.frequencies().unwrap();
    cube.header_mut().set("CTYPE3", "WAVE");
    assert!(matches!(
        cube.frequencies(),
        Err(Error::UnsupportedSpectralType(t)) if t == "WAVE"
    ));
}

#[test]
fn optical_and_radio_axes_differ() {
    let cube = ascending();
    let radio = cube.radio_velocities().unwrap();
    let optical = cube.optical_velocities().unwrap();
    // equal at the rest frequency, diverging away from it
    assert_relative_eq!(optical[5], radio[5], epsilon = 1e-9);
    assert!(optical[9] > radio[9]);
}

// ---------------------------------------------------------------------------
// Brightness and spectra
// ---------------------------------------------------------------------------

#[test]
fn brightness_round_trip() {
    let mut cube: Datacube<f64> = Datacube::from_parts(
        Array3::from_shape_fn((10, 4, 4), |(k, j, i)| (k * 16 + j * 4 + i) as f64),
        header(-50.0, 10.0),
        CubeOptions::default(),
    )
    .unwrap();
    let original = cube.data().clone();
    cube.convert_brightness_unit("Jy/beam").unwrap();
    assert_eq!(cube.header().brightness_unit().unwrap(), "Jy/beam");
    cube.convert_brightness_unit("K").unwrap();
    for (a, b) in cube.data().iter().zip(original.iter()) {
        assert_relative_eq!(a, b, max_relative = 1e-10, epsilon = 1e-12);
    }
}

#[test]
fn failed_conversion_keeps_cube() {
    let mut cube = ascending();
    let before = cube.header().clone();
    assert!(matches!(
        cube.convert_brightness_unit("W/m2"),
        Err(Error::IncompatibleUnit { .. })
    ));
    assert_eq!(cube.header(), &before);
    assert!(cube.data().iter().all(|&x| x == 1.0));
}

#[test]
fn spectra_from_the_cube() {
    let cube = ascending();
    let spectrum = cube.pixel_spectrum(30.0, 0.0).unwrap();
    assert_eq!(spectrum.len(), 10);
    assert!(spectrum.iter().all(|&x| x == 1.0));
    assert!(matches!(
        cube.pixel_spectrum(35.0, 0.0),
        Err(Error::OutOfBounds { .. })
    ));

    let total = cube.integrated_spectrum(None).unwrap();
    assert!(total.iter().all(|&x| x == 16.0));
}
