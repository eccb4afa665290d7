//! Exact Euclidean distance transform
//!
//! Felzenszwalb & Huttenlocher (2012), "Distance Transforms of Sampled
//! Functions". The squared distance is separable: a 1D lower envelope of
//! parabolas is computed down every column, then along every row of the
//! intermediate result. Both passes are O(n) per line and run in parallel
//! across lines.

use super::{DistanceField, DistanceTransform};
use crate::maybe_rayon::*;
use geomask_core::raster::Raster;
use geomask_core::{Error, Result};
use ndarray::Array2;

/// Exact Euclidean distance in pixel units
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanDistance;

impl DistanceTransform for EuclideanDistance {
    fn distance_to(&self, mask: &Raster<u8>, label: u8) -> Result<DistanceField> {
        let (rows, cols) = mask.shape();
        let data = mask.data();

        // Pass 1: squared vertical distance to the nearest label pixel
        let columns: Vec<Vec<f64>> = (0..cols)
            .into_par_iter()
            .map(|col| {
                let f: Vec<f64> = (0..rows)
                    .map(|row| {
                        if data[(row, col)] == label {
                            0.0
                        } else {
                            f64::INFINITY
                        }
                    })
                    .collect();
                let mut out = vec![f64::INFINITY; rows];
                lower_envelope(&f, &mut out);
                out
            })
            .collect();

        // Pass 2: combine along rows
        let row_data: Vec<Vec<f32>> = (0..rows)
            .into_par_iter()
            .map(|row| {
                let f: Vec<f64> = columns.iter().map(|column| column[row]).collect();
                let mut out = vec![f64::INFINITY; cols];
                lower_envelope(&f, &mut out);
                out.into_iter().map(|d2| d2.sqrt() as f32).collect()
            })
            .collect();

        let flat: Vec<f32> = row_data.into_iter().flatten().collect();
        let array =
            Array2::from_shape_vec((rows, cols), flat).map_err(|e| Error::Other(e.to_string()))?;
        Ok(DistanceField::from_array(array))
    }
}

/// 1D squared distance transform of the sampled function `f`.
///
/// `out[q] = min_p (q - p)^2 + f[p]`. Infinite samples never enter the
/// envelope; if all are infinite, `out` stays infinite.
fn lower_envelope(f: &[f64], out: &mut [f64]) {
    // Parabola apexes and the left boundary of each parabola's region
    let mut apex: Vec<usize> = Vec::with_capacity(f.len());
    let mut bound: Vec<f64> = Vec::with_capacity(f.len());

    for (q, &fq) in f.iter().enumerate() {
        if !fq.is_finite() {
            continue;
        }
        let qf = q as f64;
        while let (Some(&p), Some(&zp)) = (apex.last(), bound.last()) {
            let pf = p as f64;
            let s = ((fq + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf);
            if s <= zp {
                apex.pop();
                bound.pop();
            } else {
                apex.push(q);
                bound.push(s);
                break;
            }
        }
        if apex.is_empty() {
            apex.push(q);
            bound.push(f64::NEG_INFINITY);
        }
    }

    if apex.is_empty() {
        return;
    }

    let mut k = 0;
    for (q, slot) in out.iter_mut().enumerate() {
        let qf = q as f64;
        while k + 1 < apex.len() && bound[k + 1] < qf {
            k += 1;
        }
        let d = qf - apex[k] as f64;
        *slot = d * d + f[apex[k]];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geomask_core::raster::mask::{BACKGROUND, FOREGROUND};

    fn brute_force(mask: &Raster<u8>, label: u8) -> Array2<f32> {
        let (rows, cols) = mask.shape();
        let targets: Vec<(usize, usize)> = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (r, c)))
            .filter(|&(r, c)| mask.get(r, c).unwrap() == label)
            .collect();
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            targets
                .iter()
                .map(|&(tr, tc)| {
                    let dr = r as f64 - tr as f64;
                    let dc = c as f64 - tc as f64;
                    (dr * dr + dc * dc).sqrt() as f32
                })
                .fold(f32::INFINITY, f32::min)
        })
    }

    #[test]
    fn single_point() {
        let mut mask: Raster<u8> = Raster::new(10, 10);
        mask.set(5, 5, FOREGROUND).unwrap();
        let field = EuclideanDistance.distance_to(&mask, FOREGROUND).unwrap();

        assert_eq!(field.get(5, 5), 0.0);
        assert_relative_eq!(field.get(5, 7), 2.0);
        assert_relative_eq!(field.get(6, 6), 2f32.sqrt());
        assert_relative_eq!(field.get(0, 0), 50f32.sqrt());
    }

    #[test]
    fn matches_brute_force() {
        let mut mask: Raster<u8> = Raster::new(17, 23);
        // Deterministic scatter of foreground pixels
        for i in 0..40usize {
            let r = (i * 7 + 3) % 17;
            let c = (i * 11 + 5) % 23;
            mask.set(r, c, FOREGROUND).unwrap();
        }

        for label in [FOREGROUND, BACKGROUND] {
            let field = EuclideanDistance.distance_to(&mask, label).unwrap();
            let expected = brute_force(&mask, label);
            for ((r, c), &e) in expected.indexed_iter() {
                assert_relative_eq!(field.get(r, c), e, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn absent_label_is_infinite() {
        let mask: Raster<u8> = Raster::new(4, 6);
        let field = EuclideanDistance.distance_to(&mask, FOREGROUND).unwrap();
        assert!(field.data().iter().all(|d| d.is_infinite()));

        let field = EuclideanDistance.distance_to(&mask, BACKGROUND).unwrap();
        assert!(field.data().iter().all(|&d| d == 0.0));
    }

    #[test]
    fn sparse_columns() {
        // Only one column contains the label; the others must borrow from it
        let mut mask: Raster<u8> = Raster::new(3, 8);
        mask.set(0, 7, FOREGROUND).unwrap();
        let field = EuclideanDistance.distance_to(&mask, FOREGROUND).unwrap();
        assert_relative_eq!(field.get(2, 0), (4.0f32 + 49.0).sqrt());
        assert_eq!(field.shape(), (3, 8));
    }
}
