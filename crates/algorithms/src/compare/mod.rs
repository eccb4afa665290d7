//! Change classification between two masks
//!
//! Every pixel that differs between a reference mask and a candidate mask
//! falls into one of four buckets: newly foreground or newly background,
//! each either *normal* (within the scaled buffer distance of the reference
//! boundary, i.e. explained by a buffer of `radius`) or *isolated*. The
//! ground areas of the buckets combine into a weighted difference rating
//! normalised by the total ground area of the raster.
//!
//! Distance roles follow the sign of the radius. For `radius > 0` a newly
//! foreground pixel is tested against its distance to reference foreground
//! and a newly background pixel against its distance to reference
//! background; for `radius <= 0` the two fields swap.

mod counters;

pub use counters::{Bucket, ClassificationCounters, RatingWeights};

use crate::buffer::validate_radius;
use crate::diagnostics::{SampleErrors, ScaleRange};
use crate::distance::DistanceTransform;
use crate::maybe_rayon::*;
use crate::scale::{pixel_threshold, RowSampler, ScalePolicy, ScaleSampler};
use geomask_core::raster::mask::{BACKGROUND, FOREGROUND};
use geomask_core::raster::Raster;
use geomask_core::{Algorithm, Error, Result};
use std::fmt;
use std::str::FromStr;

/// Square metres per square kilometre
const M2_PER_KM2: f64 = 1e6;

/// How a pixel's ground area is derived from its map area and areal scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AreaModel {
    /// `pixel_size² · s`: map area multiplied by the areal scale
    #[default]
    ArealScale,
    /// `pixel_size² / s`: map area divided by the areal distortion.
    /// Sums to the true surface area of the covered band.
    Ground,
}

impl AreaModel {
    /// Ground area in km² of a pixel with map area `pixel_area_m2`
    pub fn cell_area_km2(&self, pixel_area_m2: f64, s: f64) -> f64 {
        match self {
            AreaModel::ArealScale => pixel_area_m2 * s / M2_PER_KM2,
            AreaModel::Ground => pixel_area_m2 / s / M2_PER_KM2,
        }
    }
}

impl FromStr for AreaModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ground" => Ok(AreaModel::Ground),
            "areal-scale" | "arealscale" => Ok(AreaModel::ArealScale),
            _ => Err(Error::InvalidParameter {
                name: "area-model",
                value: s.to_string(),
                reason: "expected ground or areal-scale".into(),
            }),
        }
    }
}

impl fmt::Display for AreaModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AreaModel::Ground => f.write_str("ground"),
            AreaModel::ArealScale => f.write_str("areal-scale"),
        }
    }
}

/// Parameters for change classification
#[derive(Debug, Clone, Default)]
pub struct CompareParams {
    /// Buffer tolerance in ground units
    pub radius: f64,
    pub policy: ScalePolicy,
    pub weights: RatingWeights,
    pub area_model: AreaModel,
}

impl CompareParams {
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            ..Default::default()
        }
    }
}

/// Outcome of a classification scan
#[derive(Debug, Clone, Default)]
pub struct CompareReport {
    pub counters: ClassificationCounters,
    /// Weights the rating is computed with
    pub weights: RatingWeights,
    /// Range of the linear scale over sampled pixels
    pub scale_range: ScaleRange,
    /// Range of the areal scale `s` over sampled pixels
    pub areal_range: ScaleRange,
    pub errors: SampleErrors,
}

impl CompareReport {
    pub fn weighted_area(&self) -> f64 {
        self.counters.weighted_area(&self.weights)
    }

    pub fn difference_rating(&self) -> f64 {
        self.counters.difference_rating(&self.weights)
    }

    /// `fgN:areaN:fgX:areaX:bgN:areaN:bgX:areaX:rating:weighted`
    pub fn summary_line(&self) -> String {
        self.counters.summary_line(&self.weights)
    }
}

/// Classification as an [`Algorithm`]; input is `(reference, candidate)`
#[derive(Debug, Clone)]
pub struct CompareMasks<S, D> {
    sampler: S,
    distance: D,
}

impl<S: ScaleSampler, D: DistanceTransform> CompareMasks<S, D> {
    pub fn new(sampler: S, distance: D) -> Self {
        Self { sampler, distance }
    }
}

impl<S: ScaleSampler, D: DistanceTransform> Algorithm for CompareMasks<S, D> {
    type Input = (Raster<u8>, Raster<u8>);
    type Output = CompareReport;
    type Params = CompareParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "CompareMasks"
    }

    fn description(&self) -> &'static str {
        "Classify mask differences against a buffer tolerance and rate them by ground area"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (reference, candidate) = input;
        compare_masks(&reference, &candidate, &self.sampler, &self.distance, &params)
    }
}

#[derive(Default)]
struct RowTotals {
    counters: ClassificationCounters,
    scale_range: ScaleRange,
    areal_range: ScaleRange,
    errors: SampleErrors,
}

/// Classify the differences between `reference` and `candidate`.
///
/// Both masks must have the same shape; georeferencing is taken from the
/// sampler, which is normally built from the reference. A pixel whose
/// scale cannot be sampled is left out of every bucket and of the total
/// area.
pub fn compare_masks<S, D>(
    reference: &Raster<u8>,
    candidate: &Raster<u8>,
    sampler: &S,
    distance: &D,
    params: &CompareParams,
) -> Result<CompareReport>
where
    S: ScaleSampler + ?Sized,
    D: DistanceTransform + ?Sized,
{
    reference.ensure_same_shape(candidate)?;
    let radius = params.radius;
    let pixel_size = sampler.pixel_size();
    validate_radius(radius, pixel_size)?;

    let to_foreground = distance.distance_to(reference, FOREGROUND)?;
    let to_background = distance.distance_to(reference, BACKGROUND)?;
    let (gained_field, lost_field) = if radius > 0.0 {
        (&to_foreground, &to_background)
    } else {
        (&to_background, &to_foreground)
    };

    let (rows, cols) = reference.shape();
    let ref_data = reference.data();
    let new_data = candidate.data();
    let pixel_area = pixel_size * pixel_size;
    let policy = params.policy;
    let area_model = params.area_model;

    let totals: Vec<RowTotals> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut totals = RowTotals::default();
            let mut row_sampler = RowSampler::new(sampler, row);

            for col in 0..cols {
                let factors = match row_sampler.sample(col) {
                    Ok(f) => f,
                    Err(failure) => {
                        totals.errors.record(failure);
                        continue;
                    }
                };

                let scale = policy.linear_scale(&factors);
                totals.scale_range.include(scale);
                totals.areal_range.include(factors.s);

                let area = area_model.cell_area_km2(pixel_area, factors.s);
                totals.counters.total_area_km2 += area;

                let before = ref_data[(row, col)];
                let after = new_data[(row, col)];
                if before == after {
                    continue;
                }

                let threshold = pixel_threshold(scale, radius, pixel_size);
                let within = |field: &crate::distance::DistanceField| {
                    f64::from(field.get(row, col)) < threshold
                };

                if after == FOREGROUND && before == BACKGROUND {
                    if within(gained_field) {
                        totals.counters.fg_normal.add(area);
                    } else {
                        totals.counters.fg_isolated.add(area);
                    }
                } else if after == BACKGROUND && before == FOREGROUND {
                    if within(lost_field) {
                        totals.counters.bg_normal.add(area);
                    } else {
                        totals.counters.bg_isolated.add(area);
                    }
                }
            }
            totals
        })
        .collect();

    let mut report = CompareReport {
        weights: params.weights,
        ..Default::default()
    };
    for row in totals {
        report.counters.merge(&row.counters);
        report.scale_range.merge(row.scale_range);
        report.areal_range.merge(row.areal_range);
        report.errors.merge(row.errors);
    }
    Ok(report)
}
