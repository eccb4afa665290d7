//! # geomask algorithms
//!
//! Distortion-aware processing of binary masks in projected rasters.
//!
//! ## Modules
//!
//! - **scale**: per-pixel scale factors (general projection or analytic Web Mercator)
//! - **distance**: exact Euclidean distance fields
//! - **buffer**: grow/shrink a mask by a ground distance
//! - **compare**: classify mask differences and rate them by ground area
//! - **valscale**: multiply raster values by the local areal scale
//! - **diagnostics**: capped tally of per-pixel sampling failures

pub mod buffer;
pub mod compare;
pub mod diagnostics;
pub mod distance;
pub mod maybe_rayon;
pub mod scale;
pub mod valscale;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::{buffer_mask, BufferMask, BufferParams, BufferResult, BufferSummary};
    pub use crate::compare::{
        compare_masks, AreaModel, Bucket, ClassificationCounters, CompareMasks, CompareParams,
        CompareReport, RatingWeights,
    };
    pub use crate::diagnostics::{
        SampleErrors, SampleFailure, ScaleRange, MAX_REPORTED_SAMPLE_ERRORS,
    };
    pub use crate::distance::{DistanceField, DistanceTransform, EuclideanDistance};
    pub use crate::scale::{
        ConstantSampler, ProjectionSampler, ScalePolicy, ScaleSampler, WebMercatorSampler,
    };
    pub use crate::valscale::{scale_values, ScaleValues, ValueScaleResult, ValueScaleSummary};
    pub use geomask_core::prelude::*;
}
