//! Per-pixel projection distortion
//!
//! A [`ScaleSampler`] answers "how much does the projection stretch the
//! ground at this pixel". Two families exist:
//!
//! - [`ProjectionSampler`]: inverse-projects the pixel centre through a
//!   [`Projection`](geomask_core::Projection) and evaluates its scale
//!   factors there. Works for any projection with an inverse.
//! - [`WebMercatorSampler`]: closed-form `cosh(y / R)` per row, valid only
//!   for true spherical Web Mercator covering the full globe width. Using it
//!   on any other projection silently produces wrong scales.
//!
//! [`ConstantSampler`] returns fixed factors and is mainly useful in tests
//! and for rasters known to be distortion-free.

mod projected;
mod web_mercator;

pub use projected::ProjectionSampler;
pub use web_mercator::{WebMercatorSampler, EARTH_RADIUS};

use crate::diagnostics::SampleFailure;
use geomask_core::{Error, ScaleFactors};
use std::fmt;
use std::str::FromStr;

/// Source of local scale factors for pixels of one raster
pub trait ScaleSampler: Sync {
    /// Scale factors at the centre of pixel (col, row)
    fn sample(&self, col: usize, row: usize) -> Result<ScaleFactors, SampleFailure>;

    /// Ground size of one pixel, used to turn radii into pixel distances
    fn pixel_size(&self) -> f64;

    /// Whether every pixel of a row shares the same factors
    fn is_row_invariant(&self) -> bool {
        false
    }
}

impl<S: ScaleSampler + ?Sized> ScaleSampler for &S {
    fn sample(&self, col: usize, row: usize) -> Result<ScaleFactors, SampleFailure> {
        (**self).sample(col, row)
    }

    fn pixel_size(&self) -> f64 {
        (**self).pixel_size()
    }

    fn is_row_invariant(&self) -> bool {
        (**self).is_row_invariant()
    }
}

impl<S: ScaleSampler + ?Sized> ScaleSampler for Box<S> {
    fn sample(&self, col: usize, row: usize) -> Result<ScaleFactors, SampleFailure> {
        (**self).sample(col, row)
    }

    fn pixel_size(&self) -> f64 {
        (**self).pixel_size()
    }

    fn is_row_invariant(&self) -> bool {
        (**self).is_row_invariant()
    }
}

/// Same factors everywhere
#[derive(Debug, Clone, Copy)]
pub struct ConstantSampler {
    factors: ScaleFactors,
    pixel_size: f64,
}

impl ConstantSampler {
    pub fn new(factors: ScaleFactors, pixel_size: f64) -> Self {
        Self {
            factors,
            pixel_size,
        }
    }

    /// No distortion at all (`h = k = s = 1`)
    pub fn identity(pixel_size: f64) -> Self {
        Self::new(ScaleFactors::isotropic(1.0), pixel_size)
    }
}

impl ScaleSampler for ConstantSampler {
    fn sample(&self, _col: usize, _row: usize) -> Result<ScaleFactors, SampleFailure> {
        Ok(self.factors)
    }

    fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    fn is_row_invariant(&self) -> bool {
        true
    }
}

/// How the two principal linear scales collapse into the one scale used
/// for radius thresholds.
///
/// `MaxPrincipal` over-covers along the less distorted axis but never
/// under-covers the radius in any direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalePolicy {
    /// `max(h, k)`
    #[default]
    MaxPrincipal,
    /// `min(h, k)`
    MinPrincipal,
    /// `(h + k) / 2`
    MeanPrincipal,
    /// `sqrt(s)`, the scale of an equal-area circle
    Areal,
}

impl ScalePolicy {
    pub fn linear_scale(&self, factors: &ScaleFactors) -> f64 {
        match self {
            ScalePolicy::MaxPrincipal => factors.max_linear(),
            ScalePolicy::MinPrincipal => factors.min_linear(),
            ScalePolicy::MeanPrincipal => 0.5 * (factors.h + factors.k),
            ScalePolicy::Areal => factors.s.sqrt(),
        }
    }
}

impl FromStr for ScalePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "max" | "max-principal" => Ok(ScalePolicy::MaxPrincipal),
            "min" | "min-principal" => Ok(ScalePolicy::MinPrincipal),
            "mean" | "mean-principal" => Ok(ScalePolicy::MeanPrincipal),
            "areal" => Ok(ScalePolicy::Areal),
            _ => Err(Error::InvalidParameter {
                name: "scale-policy",
                value: s.to_string(),
                reason: "expected max, min, mean or areal".into(),
            }),
        }
    }
}

impl fmt::Display for ScalePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalePolicy::MaxPrincipal => "max",
            ScalePolicy::MinPrincipal => "min",
            ScalePolicy::MeanPrincipal => "mean",
            ScalePolicy::Areal => "areal",
        };
        f.write_str(name)
    }
}

/// Threshold in pixels below which a distance counts as inside the buffer
pub(crate) fn pixel_threshold(scale: f64, radius: f64, pixel_size: f64) -> f64 {
    scale * radius.abs() / pixel_size
}

/// Walks one row, sampling each pixel at most once and a row-invariant
/// sampler only once per row.
pub(crate) struct RowSampler<'a, S: ?Sized> {
    sampler: &'a S,
    row: usize,
    cached: Option<Result<ScaleFactors, SampleFailure>>,
}

impl<'a, S: ScaleSampler + ?Sized> RowSampler<'a, S> {
    pub(crate) fn new(sampler: &'a S, row: usize) -> Self {
        Self {
            sampler,
            row,
            cached: None,
        }
    }

    pub(crate) fn sample(&mut self, col: usize) -> Result<ScaleFactors, SampleFailure> {
        if !self.sampler.is_row_invariant() {
            return self.sampler.sample(col, self.row);
        }
        self.cached
            .get_or_insert_with(|| self.sampler.sample(col, self.row))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn policies() {
        let f = ScaleFactors::new(2.0, 1.0, 1.5);
        assert_eq!(ScalePolicy::MaxPrincipal.linear_scale(&f), 2.0);
        assert_eq!(ScalePolicy::MinPrincipal.linear_scale(&f), 1.0);
        assert_eq!(ScalePolicy::MeanPrincipal.linear_scale(&f), 1.5);
        assert_relative_eq!(ScalePolicy::Areal.linear_scale(&f), 1.5f64.sqrt());
        assert_eq!(ScalePolicy::default(), ScalePolicy::MaxPrincipal);
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("MAX".parse::<ScalePolicy>().unwrap(), ScalePolicy::MaxPrincipal);
        assert_eq!("areal".parse::<ScalePolicy>().unwrap(), ScalePolicy::Areal);
        assert!("median".parse::<ScalePolicy>().is_err());
        assert_eq!(ScalePolicy::MeanPrincipal.to_string(), "mean");
    }

    #[test]
    fn threshold_uses_absolute_radius() {
        assert_eq!(pixel_threshold(2.0, -30.0, 10.0), 6.0);
        assert_eq!(pixel_threshold(1.0, 0.0, 10.0), 0.0);
    }

    struct Counting(std::sync::atomic::AtomicUsize);

    impl ScaleSampler for Counting {
        fn sample(&self, _col: usize, _row: usize) -> Result<ScaleFactors, SampleFailure> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(ScaleFactors::isotropic(1.0))
        }

        fn pixel_size(&self) -> f64 {
            1.0
        }

        fn is_row_invariant(&self) -> bool {
            true
        }
    }

    #[test]
    fn row_invariant_samplers_are_sampled_once_per_row() {
        let sampler = Counting(std::sync::atomic::AtomicUsize::new(0));
        let mut row = RowSampler::new(&sampler, 3);
        for col in 0..50 {
            row.sample(col).unwrap();
        }
        assert_eq!(sampler.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
