//! Celestial projections (FITS WCS paper II) and the native-to-celestial
//! spherical rotation.
//!
//! Angles are in degrees throughout; `(x, y)` are intermediate world
//! coordinates and `(phi, theta)` native spherical coordinates. A point
//! outside a projection's domain yields `None`.

const R0: f64 = 180.0 / core::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Gnomonic.
    Tan,
    /// Orthographic (no obliqueness parameters).
    Sin,
    /// Zenithal equidistant.
    Arc,
    /// Stereographic.
    Stg,
    /// Zenithal equal-area.
    Zea,
    /// Plate carrée.
    Car,
    /// Sanson-Flamsteed, also written GLS in older headers.
    Sfl,
}

impl Projection {
    /// Parse the three-letter algorithm code of a celestial CTYPE, e.g. the
    /// `TAN` of `RA---TAN`.
    pub fn from_ctype(ctype: &str) -> Option<Self> {
        let code = ctype.get(5..8)?.trim_end();
        let proj = match code {
            "TAN" => Projection::Tan,
            "SIN" => Projection::Sin,
            "ARC" => Projection::Arc,
            "STG" => Projection::Stg,
            "ZEA" => Projection::Zea,
            "CAR" => Projection::Car,
            "SFL" | "GLS" => Projection::Sfl,
            _ => return None,
        };
        Some(proj)
    }

    /// Native latitude of the reference point.
    pub fn theta0(self) -> f64 {
        match self {
            Projection::Car | Projection::Sfl => 0.0,
            _ => 90.0,
        }
    }

    /// Deprojection: intermediate `(x, y)` to native `(phi, theta)`.
    pub fn to_native(self, x: f64, y: f64) -> Option<(f64, f64)> {
        match self {
            Projection::Car => (y.abs() <= 90.0).then_some((x, y)),
            Projection::Sfl => {
                if y.abs() > 90.0 {
                    return None;
                }
                let c = y.to_radians().cos();
                let phi = if c == 0.0 { 0.0 } else { x / c };
                (phi.abs() <= 180.0).then_some((phi, y))
            }
            _ => {
                let r = x.hypot(y);
                let phi = if r == 0.0 {
                    0.0
                } else {
                    x.atan2(-y).to_degrees()
                };
                Some((phi, self.zenithal_theta(r)?))
            }
        }
    }

    /// Native latitude at radius `r` for the zenithal projections.
    fn zenithal_theta(self, r: f64) -> Option<f64> {
        let theta = match self {
            Projection::Tan => R0.atan2(r).to_degrees(),
            Projection::Sin => {
                if r > R0 {
                    return None;
                }
                (r / R0).acos().to_degrees()
            }
            Projection::Arc => 90.0 - r,
            Projection::Stg => 90.0 - 2.0 * (r / (2.0 * R0)).atan().to_degrees(),
            Projection::Zea => {
                if r > 2.0 * R0 {
                    return None;
                }
                90.0 - 2.0 * (r / (2.0 * R0)).asin().to_degrees()
            }
            Projection::Car | Projection::Sfl => return None,
        };
        Some(theta)
    }

    /// Radius at native latitude `theta` for the zenithal projections.
    fn zenithal_radius(self, theta: f64) -> Option<f64> {
        let r = match self {
            Projection::Tan => {
                if theta <= 0.0 {
                    return None;
                }
                R0 / theta.to_radians().tan()
            }
            Projection::Sin => {
                if theta < 0.0 {
                    return None;
                }
                R0 * theta.to_radians().cos()
            }
            Projection::Arc => 90.0 - theta,
            Projection::Stg => {
                if theta <= -90.0 {
                    return None;
                }
                2.0 * R0 * ((90.0 - theta) / 2.0).to_radians().tan()
            }
            Projection::Zea => 2.0 * R0 * ((90.0 - theta) / 2.0).to_radians().sin(),
            Projection::Car | Projection::Sfl => return None,
        };
        Some(r)
    }

    /// Projection: native `(phi, theta)` to intermediate `(x, y)`.
    pub fn to_plane(self, phi: f64, theta: f64) -> Option<(f64, f64)> {
        match self {
            Projection::Car => Some((wrap_180(phi), theta)),
            Projection::Sfl => Some((wrap_180(phi) * theta.to_radians().cos(), theta)),
            _ => {
                let r = self.zenithal_radius(theta)?;
                let p = phi.to_radians();
                Some((r * p.sin(), -r * p.cos()))
            }
        }
    }
}

/// Wrap an angle into (-180, 180].
fn wrap_180(angle: f64) -> f64 {
    let mut a = angle.rem_euclid(360.0);
    if a > 180.0 {
        a -= 360.0;
    }
    a
}

/// Rotation between native spherical and celestial coordinates, fixed by the
/// celestial coordinates of the native pole `(alpha_p, delta_p)` and the
/// native longitude of the celestial pole `phi_p`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalRotation {
    alpha_p: f64,
    delta_p: f64,
    phi_p: f64,
}

impl SphericalRotation {
    /// Derive the rotation from the reference point `(crval_lon, crval_lat)`,
    /// the projection's `theta0`, and optional `LONPOLE`/`LATPOLE`.
    pub fn new(
        crval_lon: f64,
        crval_lat: f64,
        theta0: f64,
        lonpole: Option<f64>,
        latpole: f64,
    ) -> Self {
        let phi0 = 0.0_f64;
        let phi_p = lonpole.unwrap_or(if crval_lat >= theta0 { 0.0 } else { 180.0 });

        if theta0 == 90.0 {
            return SphericalRotation {
                alpha_p: crval_lon,
                delta_p: crval_lat,
                phi_p,
            };
        }

        let (a0, d0) = (crval_lon.to_radians(), crval_lat.to_radians());
        let t0 = theta0.to_radians();
        let dphi = (phi_p - phi0).to_radians();

        let base = t0.sin().atan2(t0.cos() * dphi.cos());
        let denom = (1.0 - (t0.cos() * dphi.sin()).powi(2)).sqrt();
        let spread = (d0.sin() / denom).clamp(-1.0, 1.0).acos();

        let half_pi = core::f64::consts::FRAC_PI_2;
        let target = latpole.to_radians();
        let delta_p = [base + spread, base - spread]
            .into_iter()
            .filter(|d| d.abs() <= half_pi + 1e-12)
            .min_by(|a, b| {
                (a - target)
                    .abs()
                    .partial_cmp(&(b - target).abs())
                    .unwrap_or(core::cmp::Ordering::Equal)
            })
            .unwrap_or(base + spread)
            .clamp(-half_pi, half_pi);

        let alpha_p = if delta_p.cos().abs() < 1e-12 {
            if delta_p > 0.0 {
                a0 + dphi - core::f64::consts::PI
            } else {
                a0 - dphi
            }
        } else if d0.cos().abs() < 1e-12 {
            a0
        } else {
            let sin_da = dphi.sin() * t0.cos() / d0.cos();
            let cos_da = (t0.sin() - delta_p.sin() * d0.sin()) / (delta_p.cos() * d0.cos());
            a0 - sin_da.atan2(cos_da)
        };

        SphericalRotation {
            alpha_p: alpha_p.to_degrees(),
            delta_p: delta_p.to_degrees(),
            phi_p,
        }
    }

    /// Native `(phi, theta)` to celestial `(lon, lat)`, lon in [0, 360).
    pub fn to_celestial(&self, phi: f64, theta: f64) -> (f64, f64) {
        let (t, dp) = (theta.to_radians(), self.delta_p.to_radians());
        let dphi = (phi - self.phi_p).to_radians();
        let lon = (-t.cos() * dphi.sin())
            .atan2(t.sin() * dp.cos() - t.cos() * dp.sin() * dphi.cos())
            .to_degrees()
            + self.alpha_p;
        let lat = (t.sin() * dp.sin() + t.cos() * dp.cos() * dphi.cos())
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees();
        (lon.rem_euclid(360.0), lat)
    }

    /// Celestial `(lon, lat)` to native `(phi, theta)`.
    pub fn to_native(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (d, dp) = (lat.to_radians(), self.delta_p.to_radians());
        let da = (lon - self.alpha_p).to_radians();
        let phi = (-d.cos() * da.sin())
            .atan2(d.sin() * dp.cos() - d.cos() * dp.sin() * da.cos())
            .to_degrees()
            + self.phi_p;
        let theta = (d.sin() * dp.sin() + d.cos() * dp.cos() * da.cos())
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees();
        (wrap_180(phi), theta)
    }
}
