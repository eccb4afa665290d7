//! Closed-form scale for spherical Web Mercator

use super::ScaleSampler;
use crate::diagnostics::SampleFailure;
use geomask_core::raster::{Raster, RasterElement};
use geomask_core::ScaleFactors;
use std::f64::consts::PI;

/// Sphere radius of Web Mercator (EPSG:3857), metres
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Analytic sampler for a Web Mercator raster spanning the full globe width.
///
/// The pixel size is `2πR / width`; row `py` sits at
/// `y = pixel_size * (0.5 + py - height / 2)` (integer half height) from
/// the image centre, and the scale there is `cosh(y / R)` in every
/// direction. The geotransform and CRS are ignored, so nothing guards
/// against applying this to a raster in another projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercatorSampler {
    width: usize,
    height: usize,
    pixel_size: f64,
}

impl WebMercatorSampler {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixel_size: 2.0 * PI * EARTH_RADIUS / width as f64,
        }
    }

    pub fn for_raster<T: RasterElement>(raster: &Raster<T>) -> Self {
        Self::new(raster.cols(), raster.rows())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Linear scale of every pixel in `row`
    pub fn row_scale(&self, row: usize) -> f64 {
        let offset = 0.5 + row as f64 - (self.height / 2) as f64;
        (self.pixel_size * offset / EARTH_RADIUS).cosh()
    }
}

impl ScaleSampler for WebMercatorSampler {
    fn sample(&self, _col: usize, row: usize) -> Result<ScaleFactors, SampleFailure> {
        Ok(ScaleFactors::isotropic(self.row_scale(row)))
    }

    fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    fn is_row_invariant(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn centre_rows_are_nearly_undistorted() {
        let sampler = WebMercatorSampler::new(1024, 1024);
        assert_relative_eq!(sampler.row_scale(511), sampler.row_scale(512), epsilon = 1e-12);
        assert!(sampler.row_scale(512) < 1.0001);
        assert!(sampler.row_scale(0) > 10.0);
    }

    #[test]
    fn areal_scale_is_square_of_linear() {
        let sampler = WebMercatorSampler::new(256, 256);
        let f = sampler.sample(17, 40).unwrap();
        assert_eq!(f.h, f.k);
        assert_relative_eq!(f.s, f.h * f.h);
    }

    #[test]
    fn matches_numerical_projection() {
        use geomask_core::{ProjEngine, Projection};
        let engine = ProjEngine::new(
            "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m",
        )
        .unwrap();
        let sampler = WebMercatorSampler::new(512, 512);
        let row = 100;
        let y = sampler.pixel_size() * (0.5 + row as f64 - 256.0);
        let (lon, lat) = engine.inverse(0.0, y).unwrap();
        let f = engine.factors(lon, lat).unwrap();
        assert_relative_eq!(f.k, sampler.row_scale(row), max_relative = 1e-6);
    }

    #[test]
    fn full_globe_area_conservation() {
        // Ground area of a row is width * pixel_size^2 / s; summed over the
        // raster it must match the zonal area 2 pi R^2 (sin phi2 - sin phi1).
        let (width, height) = (4096, 2048);
        let sampler = WebMercatorSampler::new(width, height);
        let px = sampler.pixel_size();

        let total: f64 = (0..height)
            .map(|row| {
                let s = sampler.sample(0, row).unwrap().s;
                width as f64 * px * px / s * 1e-6
            })
            .sum();

        let half = px * (height / 2) as f64 / EARTH_RADIUS;
        let lat_top = half.sinh().atan();
        let lat_bottom = (-half).sinh().atan();
        let expected = 2.0 * PI * EARTH_RADIUS * EARTH_RADIUS * (lat_top.sin() - lat_bottom.sin()) * 1e-6;

        assert_relative_eq!(total, expected, max_relative = 1e-5);
    }
}
