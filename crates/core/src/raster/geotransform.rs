//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts pixel coordinates (col, row) into projected coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// The coefficients are expected to describe a non-degenerate map. This is
/// not checked; a degenerate transform yields meaningless pixel sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (GDAL coefficient 1)
    pub pixel_width: f64,
    /// Pixel height, usually negative (GDAL coefficient 5)
    pub pixel_height: f64,
    /// Rotation term (GDAL coefficient 2)
    pub row_rotation: f64,
    /// Rotation term (GDAL coefficient 4)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Projected coordinates of the centre of pixel (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let col_f = col as f64 + 0.5;
        let row_f = row as f64 + 0.5;

        let x = self.origin_x + col_f * self.pixel_width + row_f * self.row_rotation;
        let y = self.origin_y + col_f * self.col_rotation + row_f * self.pixel_height;

        (x, y)
    }

    /// Projected coordinates of the top-left corner of pixel (col, row)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        let col_f = col as f64;
        let row_f = row as f64;

        let x = self.origin_x + col_f * self.pixel_width + row_f * self.row_rotation;
        let y = self.origin_y + col_f * self.col_rotation + row_f * self.pixel_height;

        (x, y)
    }

    /// Ground distance covered by one pixel.
    ///
    /// Average of the absolute diagonal scale terms (GDAL coefficients 1
    /// and 5). Every world-space radius is converted to pixels with this
    /// value.
    pub fn mean_pixel_size(&self) -> f64 {
        0.5 * (self.pixel_width.abs() + self.pixel_height.abs())
    }

    /// Whether the transform carries rotation terms
    pub fn is_rotated(&self) -> bool {
        self.row_rotation.abs() > 1e-12 || self.col_rotation.abs() > 1e-12
    }

    /// Calculate the bounding box for a raster of given dimensions
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.pixel_to_geo_corner(0, 0);
        let (x1, y1) = self.pixel_to_geo_corner(width, 0);
        let (x2, y2) = self.pixel_to_geo_corner(0, height);
        let (x3, y3) = self.pixel_to_geo_corner(width, height);

        let min_x = x0.min(x1).min(x2).min(x3);
        let max_x = x0.max(x1).max(x2).max(x3);
        let min_y = y0.min(y1).min(y2).min(y3);
        let max_y = y0.max(y1).max(y2).max(y3);

        (min_x, min_y, max_x, max_y)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_centre() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);
        let (x, y) = gt.pixel_to_geo(5, 10);
        assert_relative_eq!(x, 155.0, epsilon = 1e-10);
        assert_relative_eq!(y, 95.0, epsilon = 1e-10);
    }

    #[test]
    fn test_pixel_centre_with_rotation() {
        let gt = GeoTransform::from_gdal([0.0, 2.0, 0.5, 0.0, 0.25, -2.0]);
        let (x, y) = gt.pixel_to_geo(1, 3);
        // x = 0 + 2*1.5 + 0.5*3.5, y = 0 + 0.25*1.5 - 2*3.5
        assert_relative_eq!(x, 4.75, epsilon = 1e-12);
        assert_relative_eq!(y, -6.625, epsilon = 1e-12);
        assert!(gt.is_rotated());
    }

    #[test]
    fn test_mean_pixel_size_uses_diagonal_terms() {
        let gt = GeoTransform::from_gdal([0.0, 30.0, 7.0, 0.0, 3.0, -20.0]);
        assert_relative_eq!(gt.mean_pixel_size(), 25.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gdal_roundtrip() {
        let coeffs = [500000.0, 10.0, 0.0, 4649776.0, 0.0, -10.0];
        assert_eq!(GeoTransform::from_gdal(coeffs).to_gdal(), coeffs);
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 100);

        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
    }
}
