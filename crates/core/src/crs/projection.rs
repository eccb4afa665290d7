//! Map projections and their local distortion
//!
//! [`ProjEngine`] wraps a proj4rs projection and derives the Tissot scale
//! factors numerically from the forward mapping.

use super::is_geographic_definition;
use crate::error::{Error, Result};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

/// Step (radians) of the central differences used for the Jacobian
const DERIVATIVE_STEP: f64 = 1e-5;

/// Latitudes closer than this to a pole have no usable meridian scale
const POLE_MARGIN: f64 = 1e-9;

/// Local scale factors of a projection at one point.
///
/// `h` is the meridian (north-south) scale, `k` the parallel (east-west)
/// scale and `s` the areal scale. For conformal projections `h == k` and
/// `s == h * k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub h: f64,
    pub k: f64,
    pub s: f64,
}

impl ScaleFactors {
    pub fn new(h: f64, k: f64, s: f64) -> Self {
        Self { h, k, s }
    }

    /// Conformal factors with equal linear scale `scale` in every direction
    pub fn isotropic(scale: f64) -> Self {
        Self::new(scale, scale, scale * scale)
    }

    /// Larger of the two principal linear scales
    pub fn max_linear(&self) -> f64 {
        self.h.max(self.k)
    }

    /// Smaller of the two principal linear scales
    pub fn min_linear(&self) -> f64 {
        self.h.min(self.k)
    }

    /// Whether every factor is finite and positive
    pub fn is_valid(&self) -> bool {
        [self.h, self.k, self.s]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }
}

/// A projection that can map projected coordinates back to the ellipsoid
/// and report its distortion there.
///
/// Geographic coordinates are in radians throughout.
pub trait Projection: Send + Sync {
    /// Projected (x, y) to geographic (lon, lat)
    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)>;

    /// Scale factors at geographic (lon, lat)
    fn factors(&self, lon: f64, lat: f64) -> Result<ScaleFactors>;

    /// Human-readable definition, used in diagnostics
    fn definition(&self) -> &str;
}

/// Reference ellipsoid: semi-major axis and squared eccentricity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub a: f64,
    pub es: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        es: 0.006_694_379_990_141_317,
    };
    pub const GRS80: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        es: 0.006_694_380_022_900_787,
    };

    /// Ellipsoid from semi-major axis and inverse flattening
    pub fn from_flattening(a: f64, rf: f64) -> Self {
        let f = 1.0 / rf;
        Self { a, es: 2.0 * f - f * f }
    }

    /// Ellipsoid from both semi-axes
    pub fn from_axes(a: f64, b: f64) -> Self {
        Self {
            a,
            es: 1.0 - (b * b) / (a * a),
        }
    }

    pub const fn sphere(radius: f64) -> Self {
        Self { a: radius, es: 0.0 }
    }

    fn named(name: &str) -> Option<Self> {
        let e = match name {
            "WGS84" => Self::WGS84,
            "GRS80" => Self::GRS80,
            "WGS72" => Self::from_flattening(6_378_135.0, 298.26),
            "intl" => Self::from_flattening(6_378_388.0, 297.0),
            "clrk66" => Self::from_axes(6_378_206.4, 6_356_583.8),
            "clrk80" => Self::from_flattening(6_378_249.145, 293.4663),
            "bessel" => Self::from_flattening(6_377_397.155, 299.152_812_8),
            "airy" => Self::from_axes(6_377_563.396, 6_356_256.910),
            "krass" => Self::from_flattening(6_378_245.0, 298.3),
            "sphere" => Self::sphere(6_370_997.0),
            _ => return None,
        };
        Some(e)
    }

    fn for_datum(name: &str) -> Option<Self> {
        match name {
            "WGS84" => Some(Self::WGS84),
            "NAD83" => Some(Self::GRS80),
            "NAD27" => Self::named("clrk66"),
            "potsdam" => Self::named("bessel"),
            "OSGB36" => Self::named("airy"),
            _ => None,
        }
    }

    /// Ellipsoid described by a PROJ definition, WGS84 when unspecified.
    ///
    /// Precedence follows PROJ: `+R`, then explicit axes or flattening,
    /// then `+ellps`, then `+datum`.
    pub fn from_proj_string(def: &str) -> Result<Self> {
        let mut radius = None;
        let mut a = None;
        let mut b = None;
        let mut rf = None;
        let mut f = None;
        let mut es = None;
        let mut ellps = None;
        let mut datum = None;

        for token in def.split_whitespace() {
            let Some((key, value)) = token.trim_start_matches('+').split_once('=') else {
                continue;
            };
            match key {
                "R" => radius = Some(parse_number(key, value)?),
                "a" => a = Some(parse_number(key, value)?),
                "b" => b = Some(parse_number(key, value)?),
                "rf" => rf = Some(parse_number(key, value)?),
                "f" => f = Some(parse_number(key, value)?),
                "es" => es = Some(parse_number(key, value)?),
                "ellps" => ellps = Some(value),
                "datum" => datum = Some(value),
                _ => {}
            }
        }

        if let Some(r) = radius {
            return Ok(Self::sphere(r));
        }

        let base = match (ellps, datum) {
            (Some(name), _) => Self::named(name).ok_or_else(|| {
                Error::Projection(format!("unknown ellipsoid '{}'", name))
            })?,
            (None, Some(name)) => Self::for_datum(name).unwrap_or(Self::WGS84),
            (None, None) => Self::WGS84,
        };

        let a = a.unwrap_or(base.a);
        let ellipsoid = if let Some(b) = b {
            Self::from_axes(a, b)
        } else if let Some(rf) = rf {
            Self::from_flattening(a, rf)
        } else if let Some(f) = f {
            Self { a, es: 2.0 * f - f * f }
        } else if let Some(es) = es {
            Self { a, es }
        } else {
            Self { a, es: base.es }
        };
        Ok(ellipsoid)
    }

    /// Meridional radius of curvature at latitude `lat`
    pub fn meridian_radius(&self, lat: f64) -> f64 {
        let w = 1.0 - self.es * lat.sin().powi(2);
        self.a * (1.0 - self.es) / w.powf(1.5)
    }

    /// Prime-vertical radius of curvature at latitude `lat`
    pub fn normal_radius(&self, lat: f64) -> f64 {
        let w = 1.0 - self.es * lat.sin().powi(2);
        self.a / w.sqrt()
    }
}

fn parse_number(key: &str, value: &str) -> Result<f64> {
    value.parse::<f64>().map_err(|_| Error::InvalidParameter {
        name: "proj",
        value: format!("+{}={}", key, value),
        reason: "not a number".into(),
    })
}

/// Tokens copied from a projected definition into its geographic companion
const DATUM_KEYS: &[&str] = &["ellps", "datum", "a", "b", "R", "rf", "f", "es", "towgs84"];

/// Geographic (lon/lat) definition on the same datum as `def`
fn geographic_companion(def: &str) -> String {
    let mut out = String::from("+proj=longlat");
    let mut has_shape = false;
    for token in def.split_whitespace() {
        let key = token
            .trim_start_matches('+')
            .split('=')
            .next()
            .unwrap_or_default();
        if DATUM_KEYS.contains(&key) {
            out.push(' ');
            out.push_str(token);
            has_shape |= key != "towgs84";
        }
    }
    if !has_shape {
        out.push_str(" +ellps=WGS84");
    }
    out.push_str(" +no_defs");
    out
}

/// Value of `+key=` in a PROJ definition, parsed as a number
fn numeric_parameter(def: &str, key: &str) -> Option<f64> {
    def.split_whitespace()
        .filter_map(|t| t.trim_start_matches('+').split_once('='))
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| v.parse::<f64>().ok())
}

/// Natural origin (lon, lat) in degrees; UTM derives its meridian from the zone
fn natural_origin(def: &str) -> (f64, f64) {
    let lat = numeric_parameter(def, "lat_0").unwrap_or(0.0);
    let lon = match (numeric_parameter(def, "lon_0"), numeric_parameter(def, "zone")) {
        (Some(lon), _) => lon,
        (None, Some(zone)) => 6.0 * zone - 183.0,
        (None, None) => 0.0,
    };
    (lon, lat)
}

/// General projection backed by proj4rs.
///
/// Scale factors come from the Jacobian of the forward projection, taken
/// by central differences on the ellipsoid:
///
/// ```text
/// h = |d(x,y)/dlat| / M
/// k = |d(x,y)/dlon| / (N cos lat)
/// s = |det J| / (M N cos lat)
/// ```
#[derive(Debug, Clone)]
pub struct ProjEngine {
    projected: Proj,
    geographic: Proj,
    ellipsoid: Ellipsoid,
    definition: String,
}

impl ProjEngine {
    /// Build an engine from a PROJ definition string.
    ///
    /// Fails for unparseable definitions, for geographic systems (their
    /// units are degrees, not metres) and for projections without an
    /// inverse.
    pub fn new(definition: &str) -> Result<Self> {
        let definition = definition.trim().to_string();
        if is_geographic_definition(&definition) {
            return Err(Error::GeographicCrs(definition));
        }

        let projected = Proj::from_proj_string(&definition)
            .map_err(|e| Error::Projection(format!("{}: {:?}", definition, e)))?;
        let companion = geographic_companion(&definition);
        let geographic = Proj::from_proj_string(&companion)
            .map_err(|e| Error::Projection(format!("{}: {:?}", companion, e)))?;
        let ellipsoid = Ellipsoid::from_proj_string(&definition)?;

        let engine = Self {
            projected,
            geographic,
            ellipsoid,
            definition,
        };
        if !engine.has_inverse() {
            return Err(Error::NoInverse(engine.definition));
        }
        Ok(engine)
    }

    /// Whether projected coordinates can be mapped back to the ellipsoid.
    ///
    /// Probes a round trip through the natural origin. An origin outside
    /// the projection's domain is not held against it; inverse failures
    /// then surface per pixel while sampling.
    pub fn has_inverse(&self) -> bool {
        let (lon, lat) = natural_origin(&self.definition);
        // Polar aspects put the origin on the pole itself
        let lat = lat.clamp(-89.0, 89.0);
        match self.forward(lon.to_radians(), lat.to_radians()) {
            Ok((x, y)) => self.inverse(x, y).is_ok(),
            Err(_) => true,
        }
    }

    /// Geographic (lon, lat) in radians to projected (x, y)
    pub fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        let mut point = (lon, lat, 0.0);
        transform(&self.geographic, &self.projected, &mut point)
            .map_err(|e| Error::Projection(format!("forward transform failed: {:?}", e)))?;
        if !point.0.is_finite() || !point.1.is_finite() {
            return Err(Error::Projection(format!(
                "non-finite forward result at {:.6}/{:.6}",
                lon.to_degrees(),
                lat.to_degrees()
            )));
        }
        Ok((point.0, point.1))
    }

    pub fn ellipsoid(&self) -> Ellipsoid {
        self.ellipsoid
    }
}

impl Projection for ProjEngine {
    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let mut point = (x, y, 0.0);
        transform(&self.projected, &self.geographic, &mut point)
            .map_err(|e| Error::Projection(format!("inverse transform failed: {:?}", e)))?;
        if !point.0.is_finite() || !point.1.is_finite() {
            return Err(Error::Projection(format!(
                "non-finite inverse result at {:.2}/{:.2}",
                x, y
            )));
        }
        Ok((point.0, point.1))
    }

    fn factors(&self, lon: f64, lat: f64) -> Result<ScaleFactors> {
        let step = DERIVATIVE_STEP;
        if lat.abs() + step >= std::f64::consts::FRAC_PI_2 - POLE_MARGIN {
            return Err(Error::Projection(format!(
                "latitude {:.6} too close to the pole",
                lat.to_degrees()
            )));
        }

        let (x_n, y_n) = self.forward(lon, lat + step)?;
        let (x_s, y_s) = self.forward(lon, lat - step)?;
        let (x_e, y_e) = self.forward(lon + step, lat)?;
        let (x_w, y_w) = self.forward(lon - step, lat)?;

        let x_phi = (x_n - x_s) / (2.0 * step);
        let y_phi = (y_n - y_s) / (2.0 * step);
        let x_lam = (x_e - x_w) / (2.0 * step);
        let y_lam = (y_e - y_w) / (2.0 * step);

        let m = self.ellipsoid.meridian_radius(lat);
        let n = self.ellipsoid.normal_radius(lat);
        let cos_lat = lat.cos();

        let h = x_phi.hypot(y_phi) / m;
        let k = x_lam.hypot(y_lam) / (n * cos_lat);
        let s = (y_phi * x_lam - x_phi * y_lam).abs() / (m * n * cos_lat);

        let factors = ScaleFactors::new(h, k, s);
        if !factors.is_valid() {
            return Err(Error::Projection(format!(
                "degenerate scale factors at {:.6}/{:.6}",
                lon.to_degrees(),
                lat.to_degrees()
            )));
        }
        Ok(factors)
    }

    fn definition(&self) -> &str {
        &self.definition
    }
}
