//! Distortion-aware buffering of binary masks
//!
//! Grows the foreground (positive radius) or the background (negative
//! radius) by a ground distance. At each pixel the radius is converted to
//! a pixel threshold with the local projection scale:
//!
//! ```text
//! threshold = scale * |radius| / pixel_size
//! ```
//!
//! and the pixel takes the growing label when its distance to that label
//! is strictly below the threshold.

use crate::diagnostics::{SampleErrors, ScaleRange};
use crate::distance::DistanceTransform;
use crate::maybe_rayon::*;
use crate::scale::{pixel_threshold, RowSampler, ScalePolicy, ScaleSampler};
use geomask_core::raster::mask::{BACKGROUND, FOREGROUND};
use geomask_core::raster::Raster;
use geomask_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Parameters for mask buffering
#[derive(Debug, Clone, Default)]
pub struct BufferParams {
    /// Signed ground distance; positive grows foreground, negative grows background
    pub radius: f64,
    /// How `h` and `k` collapse into one linear scale
    pub policy: ScalePolicy,
}

impl BufferParams {
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            ..Default::default()
        }
    }
}

/// What a buffering run did
#[derive(Debug, Clone, Default)]
pub struct BufferSummary {
    /// Pixels whose value changed
    pub changed: usize,
    /// Range of the linear scale over successfully sampled pixels
    pub scale_range: ScaleRange,
    /// Pixels whose scale could not be sampled (left unchanged)
    pub errors: SampleErrors,
}

/// Buffered mask plus run summary
#[derive(Debug, Clone)]
pub struct BufferResult {
    pub mask: Raster<u8>,
    pub summary: BufferSummary,
}

/// Buffering as an [`Algorithm`], owning its sampler and distance provider
#[derive(Debug, Clone)]
pub struct BufferMask<S, D> {
    sampler: S,
    distance: D,
}

impl<S: ScaleSampler, D: DistanceTransform> BufferMask<S, D> {
    pub fn new(sampler: S, distance: D) -> Self {
        Self { sampler, distance }
    }
}

impl<S: ScaleSampler, D: DistanceTransform> Algorithm for BufferMask<S, D> {
    type Input = Raster<u8>;
    type Output = BufferResult;
    type Params = BufferParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "BufferMask"
    }

    fn description(&self) -> &'static str {
        "Grow or shrink a binary mask by a ground distance, corrected for projection scale"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        buffer_mask(&input, &self.sampler, &self.distance, &params)
    }
}

struct RowOutcome {
    values: Vec<u8>,
    changed: usize,
    scale_range: ScaleRange,
    errors: SampleErrors,
}

pub(crate) fn validate_radius(radius: f64, pixel_size: f64) -> Result<()> {
    if !radius.is_finite() {
        return Err(Error::InvalidParameter {
            name: "radius",
            value: radius.to_string(),
            reason: "must be finite".into(),
        });
    }
    if !(pixel_size.is_finite() && pixel_size > 0.0) {
        return Err(Error::InvalidParameter {
            name: "pixel_size",
            value: pixel_size.to_string(),
            reason: "must be positive".into(),
        });
    }
    Ok(())
}

/// Buffer `mask` by `params.radius` ground units.
///
/// A zero radius returns the mask unchanged without sampling. Pixels where
/// sampling fails keep their value and are tallied in the summary.
pub fn buffer_mask<S, D>(
    mask: &Raster<u8>,
    sampler: &S,
    distance: &D,
    params: &BufferParams,
) -> Result<BufferResult>
where
    S: ScaleSampler + ?Sized,
    D: DistanceTransform + ?Sized,
{
    let radius = params.radius;
    let pixel_size = sampler.pixel_size();
    validate_radius(radius, pixel_size)?;

    if radius == 0.0 {
        return Ok(BufferResult {
            mask: mask.clone(),
            summary: BufferSummary::default(),
        });
    }

    let target = if radius > 0.0 { FOREGROUND } else { BACKGROUND };
    let field = distance.distance_to(mask, target)?;
    let (rows, cols) = mask.shape();
    let data = mask.data();
    let policy = params.policy;

    let outcomes: Vec<RowOutcome> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut outcome = RowOutcome {
                values: Vec::with_capacity(cols),
                changed: 0,
                scale_range: ScaleRange::default(),
                errors: SampleErrors::new(),
            };
            let mut row_sampler = RowSampler::new(sampler, row);

            for col in 0..cols {
                let value = data[(row, col)];
                let factors = match row_sampler.sample(col) {
                    Ok(f) => f,
                    Err(failure) => {
                        outcome.errors.record(failure);
                        outcome.values.push(value);
                        continue;
                    }
                };

                let scale = policy.linear_scale(&factors);
                outcome.scale_range.include(scale);

                let threshold = pixel_threshold(scale, radius, pixel_size);
                if f64::from(field.get(row, col)) < threshold && value != target {
                    outcome.values.push(target);
                    outcome.changed += 1;
                } else {
                    outcome.values.push(value);
                }
            }
            outcome
        })
        .collect();

    let mut summary = BufferSummary::default();
    let mut values = Vec::with_capacity(rows * cols);
    for outcome in outcomes {
        values.extend(outcome.values);
        summary.changed += outcome.changed;
        summary.scale_range.merge(outcome.scale_range);
        summary.errors.merge(outcome.errors);
    }

    let array =
        Array2::from_shape_vec((rows, cols), values).map_err(|e| Error::Other(e.to_string()))?;
    Ok(BufferResult {
        mask: mask.with_data(array)?,
        summary,
    })
}
