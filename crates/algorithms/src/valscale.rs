//! Areal scaling of raster values
//!
//! Multiplies every band value by the local areal scale `s`, turning
//! per-map-area quantities into per-ground-area ones. The same factor
//! applies to all bands of a pixel.

use crate::diagnostics::{SampleErrors, ScaleRange};
use crate::maybe_rayon::*;
use crate::scale::{RowSampler, ScaleSampler};
use geomask_core::raster::Raster;
use geomask_core::{Algorithm, Error, Result};
use ndarray::{Array2, Zip};

/// What a scaling run did
#[derive(Debug, Clone, Default)]
pub struct ValueScaleSummary {
    /// Range of `s` over successfully sampled pixels
    pub areal_range: ScaleRange,
    /// Pixels left unscaled because sampling failed
    pub errors: SampleErrors,
}

#[derive(Debug, Clone)]
pub struct ValueScaleResult {
    pub bands: Vec<Raster<f64>>,
    pub summary: ValueScaleSummary,
}

/// Areal value scaling as an [`Algorithm`]
#[derive(Debug, Clone)]
pub struct ScaleValues<S> {
    sampler: S,
}

impl<S: ScaleSampler> ScaleValues<S> {
    pub fn new(sampler: S) -> Self {
        Self { sampler }
    }
}

impl<S: ScaleSampler> Algorithm for ScaleValues<S> {
    type Input = Vec<Raster<f64>>;
    type Output = ValueScaleResult;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "ScaleValues"
    }

    fn description(&self) -> &'static str {
        "Multiply band values by the local areal scale of the projection"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        scale_values(&input, &self.sampler)
    }
}

struct RowScale {
    /// Areal scale per column, `None` where sampling failed
    factors: Vec<Option<f64>>,
    areal_range: ScaleRange,
    errors: SampleErrors,
}

/// Scale all `bands` (same shape) by the areal scale at each pixel.
///
/// No-data cells stay untouched, as do all bands of a pixel whose scale
/// could not be sampled.
pub fn scale_values<S>(bands: &[Raster<f64>], sampler: &S) -> Result<ValueScaleResult>
where
    S: ScaleSampler + ?Sized,
{
    let first = bands
        .first()
        .ok_or_else(|| Error::Algorithm("no bands to scale".into()))?;
    for band in &bands[1..] {
        first.ensure_same_shape(band)?;
    }
    let (rows, cols) = first.shape();

    let row_scales: Vec<RowScale> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut out = RowScale {
                factors: Vec::with_capacity(cols),
                areal_range: ScaleRange::default(),
                errors: SampleErrors::new(),
            };
            let mut row_sampler = RowSampler::new(sampler, row);
            for col in 0..cols {
                match row_sampler.sample(col) {
                    Ok(f) => {
                        out.areal_range.include(f.s);
                        out.factors.push(Some(f.s));
                    }
                    Err(failure) => {
                        out.errors.record(failure);
                        out.factors.push(None);
                    }
                }
            }
            out
        })
        .collect();

    let mut summary = ValueScaleSummary::default();
    let mut factors: Vec<Option<f64>> = Vec::with_capacity(rows * cols);
    for row in row_scales {
        factors.extend(row.factors);
        summary.areal_range.merge(row.areal_range);
        summary.errors.merge(row.errors);
    }
    let factors = Array2::from_shape_vec((rows, cols), factors)
        .map_err(|e| Error::Other(e.to_string()))?;

    let scaled = bands
        .iter()
        .map(|band| {
            let mut out = band.clone();
            Zip::from(out.data_mut()).and(&factors).for_each(|v, s| {
                if let Some(s) = s {
                    if !band.is_nodata(*v) {
                        *v *= s;
                    }
                }
            });
            out
        })
        .collect();

    Ok(ValueScaleResult {
        bands: scaled,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SampleFailure;
    use crate::scale::{ConstantSampler, WebMercatorSampler};
    use approx::assert_relative_eq;
    use geomask_core::ScaleFactors;

    #[test]
    fn multiplies_every_band() {
        let bands = vec![Raster::filled(3, 4, 2.0), Raster::filled(3, 4, -1.0)];
        let sampler = ConstantSampler::new(ScaleFactors::isotropic(3.0), 1.0);
        let result = scale_values(&bands, &sampler).unwrap();
        assert_relative_eq!(result.bands[0].get(1, 1).unwrap(), 18.0);
        assert_relative_eq!(result.bands[1].get(2, 3).unwrap(), -9.0);
        assert_eq!(result.summary.areal_range.max, 9.0);
    }

    #[test]
    fn nodata_is_preserved() {
        let mut band = Raster::filled(2, 2, 5.0);
        band.set_nodata(Some(-9999.0));
        band.set(0, 0, -9999.0).unwrap();
        band.set(0, 1, f64::NAN).unwrap();
        let result = scale_values(&[band], &ConstantSampler::new(ScaleFactors::isotropic(2.0), 1.0)).unwrap();
        assert_eq!(result.bands[0].get(0, 0).unwrap(), -9999.0);
        assert!(result.bands[0].get(0, 1).unwrap().is_nan());
        assert_relative_eq!(result.bands[0].get(1, 1).unwrap(), 20.0);
    }

    struct FailsOnDiagonal;

    impl ScaleSampler for FailsOnDiagonal {
        fn sample(&self, col: usize, row: usize) -> std::result::Result<ScaleFactors, SampleFailure> {
            if col == row {
                Err(SampleFailure::new(col as f64, row as f64, "diagonal"))
            } else {
                Ok(ScaleFactors::new(1.0, 1.0, 2.0))
            }
        }

        fn pixel_size(&self) -> f64 {
            1.0
        }
    }

    #[test]
    fn failures_leave_pixels_unscaled() {
        let bands = vec![Raster::filled(3, 3, 1.0), Raster::filled(3, 3, 4.0)];
        let result = scale_values(&bands, &FailsOnDiagonal).unwrap();
        assert_eq!(result.summary.errors.total(), 3);
        assert_eq!(result.bands[0].get(1, 1).unwrap(), 1.0);
        assert_eq!(result.bands[1].get(1, 1).unwrap(), 4.0);
        assert_eq!(result.bands[1].get(0, 1).unwrap(), 8.0);
    }

    #[test]
    fn web_mercator_rows_scale_differently() {
        let band = Raster::filled(64, 128, 1.0);
        let result = scale_values(&[band], &WebMercatorSampler::new(128, 64)).unwrap();
        let top = result.bands[0].get(0, 0).unwrap();
        let middle = result.bands[0].get(32, 0).unwrap();
        assert!(top > middle);
        assert_relative_eq!(result.bands[0].get(0, 100).unwrap(), top);
    }

    #[test]
    fn shape_mismatch_and_empty_input() {
        let bands = vec![Raster::<f64>::new(2, 2), Raster::<f64>::new(3, 2)];
        let sampler = ConstantSampler::identity(1.0);
        assert!(matches!(scale_values(&bands, &sampler), Err(Error::SizeMismatch { .. })));
        assert!(scale_values(&[], &sampler).is_err());
    }
}
