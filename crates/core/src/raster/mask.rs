//! Binary mask helpers
//!
//! A mask is a single-band `Raster<u8>` where every pixel is either
//! [`FOREGROUND`] (255) or [`BACKGROUND`] (0).

use super::Raster;

/// Label of pixels inside the mask
pub const FOREGROUND: u8 = 255;

/// Label of pixels outside the mask
pub const BACKGROUND: u8 = 0;

/// The opposite label of `value` (`255 <-> 0`); other values map to background
pub fn opposite(value: u8) -> u8 {
    if value == FOREGROUND {
        BACKGROUND
    } else {
        FOREGROUND
    }
}

/// Swap foreground and background, keeping georeferencing
pub fn invert(mask: &Raster<u8>) -> Raster<u8> {
    let mut out = mask.clone();
    out.data_mut().mapv_inplace(opposite);
    out
}

/// Whether every pixel is exactly 0 or 255
pub fn is_binary(mask: &Raster<u8>) -> bool {
    mask.data()
        .iter()
        .all(|&v| v == FOREGROUND || v == BACKGROUND)
}

/// Number of foreground pixels
pub fn count_foreground(mask: &Raster<u8>) -> usize {
    mask.data().iter().filter(|&&v| v == FOREGROUND).count()
}

/// Number of pixels that differ between two equally sized masks
pub fn count_differences(a: &Raster<u8>, b: &Raster<u8>) -> usize {
    a.data()
        .iter()
        .zip(b.data().iter())
        .filter(|(x, y)| x != y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_swaps_labels() {
        let mut mask: Raster<u8> = Raster::new(3, 3);
        mask.set(1, 1, FOREGROUND).unwrap();

        let inverted = invert(&mask);
        assert_eq!(inverted.get(1, 1).unwrap(), BACKGROUND);
        assert_eq!(inverted.get(0, 0).unwrap(), FOREGROUND);
        assert_eq!(count_foreground(&inverted), 8);
        assert_eq!(count_differences(&mask, &inverted), 9);
    }

    #[test]
    fn binary_check() {
        let mut mask: Raster<u8> = Raster::new(2, 2);
        assert!(is_binary(&mask));
        mask.set(0, 1, 17).unwrap();
        assert!(!is_binary(&mask));
    }
}
