//! Distance fields over binary masks
//!
//! A distance field holds, for every pixel, the Euclidean distance in
//! pixel units to the nearest pixel carrying a target label. Pixels that
//! carry the label have distance 0. If the label does not occur in the mask
//! at all, every distance is `f32::INFINITY`.

mod edt;

pub use edt::EuclideanDistance;

use geomask_core::raster::Raster;
use geomask_core::Result;
use ndarray::Array2;

/// Per-pixel distance to the nearest pixel of one label
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceField {
    data: Array2<f32>,
}

impl DistanceField {
    pub fn from_array(data: Array2<f32>) -> Self {
        Self { data }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[(row, col)]
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn into_array(self) -> Array2<f32> {
        self.data
    }
}

/// Provider of distance fields
pub trait DistanceTransform: Sync {
    /// Distance from every pixel of `mask` to the nearest pixel equal to `label`
    fn distance_to(&self, mask: &Raster<u8>, label: u8) -> Result<DistanceField>;
}

impl<D: DistanceTransform + ?Sized> DistanceTransform for &D {
    fn distance_to(&self, mask: &Raster<u8>, label: u8) -> Result<DistanceField> {
        (**self).distance_to(mask, label)
    }
}
