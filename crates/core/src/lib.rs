//! # geomask core
//!
//! Core types, traits and I/O for distortion-aware mask processing.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate reference system metadata and PROJ definitions
//! - `Projection`: Inverse projection and local scale factors
//! - Binary mask helpers (foreground = 255, background = 0)
//! - GeoTIFF I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::{ProjEngine, Projection, ScaleFactors, CRS};
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{ProjEngine, Projection, ScaleFactors, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{mask, GeoTransform, Raster, RasterElement};
    pub use crate::Algorithm;
}

/// Core trait for raster algorithms.
///
/// Algorithms own their collaborators (samplers, distance providers) and
/// transform an input according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
