//! Scale sampling through a general projection

use super::ScaleSampler;
use crate::diagnostics::SampleFailure;
use geomask_core::raster::{Raster, RasterElement};
use geomask_core::{Error, GeoTransform, ProjEngine, Projection, Result, ScaleFactors};

/// Samples scale factors by inverse-projecting each pixel centre.
///
/// For pixel (col, row) the projected coordinate is taken at the pixel
/// centre `(col + 0.5, row + 0.5)` through the affine transform, mapped to
/// (lon, lat) with the projection's inverse, and the factors are evaluated
/// there. Either step failing yields a [`SampleFailure`] for that pixel.
#[derive(Debug, Clone)]
pub struct ProjectionSampler<P> {
    projection: P,
    transform: GeoTransform,
    pixel_size: f64,
}

impl<P: Projection> ProjectionSampler<P> {
    pub fn new(projection: P, transform: GeoTransform) -> Self {
        Self {
            projection,
            pixel_size: transform.mean_pixel_size(),
            transform,
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }
}

impl ProjectionSampler<ProjEngine> {
    /// Set up a sampler for `raster`.
    ///
    /// `definition` overrides the PROJ string derived from the raster's CRS.
    /// Fails when the raster has no geotransform, no resolvable projection,
    /// a geographic CRS, or a projection without inverse.
    pub fn for_raster<T: RasterElement>(raster: &Raster<T>, definition: Option<&str>) -> Result<Self> {
        let transform = *raster.require_transform()?;
        let definition = match definition {
            Some(def) => def.to_string(),
            None => {
                let crs = raster.crs().ok_or(Error::MissingProjection)?;
                if crs.is_geographic() {
                    return Err(Error::GeographicCrs(crs.identifier()));
                }
                crs.proj_definition().ok_or(Error::MissingProjection)?
            }
        };
        let engine = ProjEngine::new(&definition)?;
        Ok(Self::new(engine, transform))
    }
}

impl<P: Projection> ScaleSampler for ProjectionSampler<P> {
    fn sample(&self, col: usize, row: usize) -> std::result::Result<ScaleFactors, SampleFailure> {
        let (x, y) = self.transform.pixel_to_geo(col, row);
        let fail = |e: Error| SampleFailure::new(x, y, e.to_string());
        let (lon, lat) = self.projection.inverse(x, y).map_err(fail)?;
        self.projection.factors(lon, lat).map_err(fail)
    }

    fn pixel_size(&self) -> f64 {
        self.pixel_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geomask_core::CRS;

    /// Projection with scale growing linearly with y, failing for negative y
    struct Stretch;

    impl Projection for Stretch {
        fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
            if y < 0.0 {
                return Err(Error::Projection("outside domain".into()));
            }
            Ok((x, y))
        }

        fn factors(&self, _lon: f64, lat: f64) -> Result<ScaleFactors> {
            Ok(ScaleFactors::new(1.0 + lat, 1.0, 1.0 + lat))
        }

        fn definition(&self) -> &str {
            "stretch"
        }
    }

    #[test]
    fn samples_at_pixel_centres() {
        let sampler = ProjectionSampler::new(Stretch, GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        // Row 1 centre is y = 4 - 1.5 = 2.5
        let f = sampler.sample(0, 1).unwrap();
        assert_relative_eq!(f.h, 3.5);
        assert_eq!(sampler.pixel_size(), 1.0);
    }

    #[test]
    fn failures_carry_projected_coordinates() {
        let sampler = ProjectionSampler::new(Stretch, GeoTransform::new(10.0, 1.0, 2.0, -2.0));
        let err = sampler.sample(1, 3).unwrap_err();
        assert_relative_eq!(err.x, 13.0);
        assert_relative_eq!(err.y, -6.0);
        assert!(err.reason.contains("outside domain"));
    }

    #[test]
    fn setup_requires_geotransform_and_projection() {
        let mut mask: Raster<u8> = Raster::new(4, 4);
        assert!(matches!(
            ProjectionSampler::for_raster(&mask, None),
            Err(Error::MissingGeoTransform)
        ));

        mask.set_transform(GeoTransform::new(0.0, 0.0, 10.0, -10.0));
        assert!(matches!(
            ProjectionSampler::for_raster(&mask, None),
            Err(Error::MissingProjection)
        ));

        mask.set_crs(Some(CRS::from_epsg(4326)));
        assert!(matches!(
            ProjectionSampler::for_raster(&mask, None),
            Err(Error::GeographicCrs(_))
        ));

        mask.set_crs(Some(CRS::from_epsg(3857)));
        assert!(ProjectionSampler::for_raster(&mask, None).is_ok());
    }

    #[test]
    fn explicit_definition_overrides_metadata() {
        let mut mask: Raster<u8> = Raster::new(4, 4);
        mask.set_transform(GeoTransform::new(500_000.0, 5_000_000.0, 10.0, -10.0));
        let sampler =
            ProjectionSampler::for_raster(&mask, Some("+proj=utm +zone=33 +datum=WGS84 +units=m"))
                .unwrap();
        let f = sampler.sample(0, 0).unwrap();
        assert_relative_eq!(f.k, 0.9996, max_relative = 1e-4);
    }
}
