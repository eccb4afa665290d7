//! End-to-end tests: GeoTIFF in, buffer / compare / valscale, GeoTIFF out.
//!
//! Masks are written with the native GeoTIFF writer into temporary files,
//! read back the way the command-line tool reads them, and processed with
//! real projections.

use approx::assert_relative_eq;
use geomask_algorithms::buffer::{buffer_mask, BufferParams};
use geomask_algorithms::compare::{compare_masks, CompareParams};
use geomask_algorithms::distance::EuclideanDistance;
use geomask_algorithms::scale::{ProjectionSampler, ScaleSampler, WebMercatorSampler, EARTH_RADIUS};
use geomask_algorithms::valscale::scale_values;
use geomask_core::io::{read_geotiff, read_geotiff_bands, write_geotiff, write_geotiff_bands};
use geomask_core::raster::mask::{count_foreground, invert, BACKGROUND, FOREGROUND};
use geomask_core::{Error, GeoTransform, Raster, CRS};
use std::f64::consts::PI;
use tempfile::TempDir;

/// 64x64 mask in UTM 33N, 30 m pixels, with a 10x10 block in the middle
fn utm_mask() -> Raster<u8> {
    let mut mask = Raster::new(64, 64);
    mask.set_transform(GeoTransform::new(499_040.0, 5_000_960.0, 30.0, -30.0));
    mask.set_crs(Some(CRS::from_epsg(32633)));
    for r in 27..37 {
        for c in 27..37 {
            mask.set(r, c, FOREGROUND).unwrap();
        }
    }
    mask
}

/// Full-width Web Mercator mask with two foreground rows
fn web_mercator_mask(width: usize, height: usize) -> Raster<u8> {
    let mut mask = Raster::new(height, width);
    let extent = PI * EARTH_RADIUS;
    let px = 2.0 * extent / width as f64;
    mask.set_transform(GeoTransform::new(-extent, px * height as f64 / 2.0, px, -px));
    mask.set_crs(Some(CRS::web_mercator()));
    for c in 0..width {
        mask.set(height / 4, c, FOREGROUND).unwrap();
        mask.set(height / 2, c, FOREGROUND).unwrap();
    }
    mask
}

#[test]
fn buffer_through_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mask.tif");
    write_geotiff(&utm_mask(), &path, None).unwrap();

    let mask: Raster<u8> = read_geotiff(&path, None).unwrap();
    let sampler = ProjectionSampler::for_raster(&mask, None).unwrap();

    // Near the central meridian k ~ 0.9996, so 60 m is just under 2 pixels
    let result = buffer_mask(&mask, &sampler, &EuclideanDistance, &BufferParams::new(60.0)).unwrap();
    assert!(result.summary.errors.is_empty());
    assert!(result.summary.scale_range.max < 1.0);
    // One ring of 44 pixels plus the corners reached at sqrt(2)
    assert_eq!(count_foreground(&result.mask), 100 + 44);

    write_geotiff(&result.mask, &path, None).unwrap();
    let reread: Raster<u8> = read_geotiff(&path, None).unwrap();
    assert_eq!(reread.data(), result.mask.data());
    assert_eq!(reread.transform(), mask.transform());
    assert_eq!(reread.crs().and_then(CRS::epsg), Some(32633));
}

#[test]
fn buffer_then_compare_is_all_normal() {
    let reference = utm_mask();
    let sampler = ProjectionSampler::for_raster(&reference, None).unwrap();

    let grown = buffer_mask(&reference, &sampler, &EuclideanDistance, &BufferParams::new(90.0))
        .unwrap()
        .mask;
    let report =
        compare_masks(&reference, &grown, &sampler, &EuclideanDistance, &CompareParams::new(90.0)).unwrap();

    assert!(report.counters.fg_normal.count > 0);
    assert_eq!(report.counters.fg_isolated.count, 0);
    assert_eq!(report.counters.bg_normal.count + report.counters.bg_isolated.count, 0);
    assert!(report.difference_rating() > 0.0);

    let shrunk = buffer_mask(&reference, &sampler, &EuclideanDistance, &BufferParams::new(-45.0))
        .unwrap()
        .mask;
    let report =
        compare_masks(&reference, &shrunk, &sampler, &EuclideanDistance, &CompareParams::new(-45.0))
            .unwrap();
    assert_eq!(report.counters.bg_normal.count, 100 - 64);
    assert_eq!(report.counters.fg_normal.count + report.counters.fg_isolated.count, 0);
}

#[test]
fn sign_symmetry_with_projection() {
    let mask = utm_mask();
    let sampler = ProjectionSampler::for_raster(&mask, None).unwrap();
    let grown = buffer_mask(&mask, &sampler, &EuclideanDistance, &BufferParams::new(75.0))
        .unwrap()
        .mask;
    let shrunk = buffer_mask(&invert(&mask), &sampler, &EuclideanDistance, &BufferParams::new(-75.0))
        .unwrap()
        .mask;
    assert_eq!(invert(&grown).data(), shrunk.data());
}

#[test]
fn web_mercator_analytic_matches_projection() {
    let mask = web_mercator_mask(256, 128);
    let analytic = WebMercatorSampler::for_raster(&mask);
    let numeric = ProjectionSampler::for_raster(&mask, None).unwrap();
    assert_relative_eq!(analytic.pixel_size(), numeric.pixel_size(), max_relative = 1e-12);

    let radius = 3.0 * analytic.pixel_size();
    let a = buffer_mask(&mask, &analytic, &EuclideanDistance, &BufferParams::new(radius)).unwrap();
    let n = buffer_mask(&mask, &numeric, &EuclideanDistance, &BufferParams::new(radius)).unwrap();

    // Top rows are past 70 degrees south
    assert!(a.summary.scale_range.max > 2.0);
    assert_eq!(a.mask.data(), n.mask.data());
}

#[test]
fn compare_rejects_mismatched_sizes() {
    let reference = utm_mask();
    let other: Raster<u8> = Raster::new(32, 64);
    let sampler = ProjectionSampler::for_raster(&reference, None).unwrap();
    let err = compare_masks(&reference, &other, &sampler, &EuclideanDistance, &CompareParams::new(10.0));
    assert!(matches!(err, Err(Error::SizeMismatch { .. })));
}

#[test]
fn missing_metadata_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bare.tif");
    let bare: Raster<u8> = Raster::filled(8, 8, BACKGROUND);
    write_geotiff(&bare, &path, None).unwrap();

    let mask: Raster<u8> = read_geotiff(&path, None).unwrap();
    assert!(matches!(
        ProjectionSampler::for_raster(&mask, None),
        Err(Error::MissingGeoTransform)
    ));
}

#[test]
fn valscale_multiband_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.tif");
    let template = web_mercator_mask(64, 32);
    let bands: Vec<Raster<f64>> = (1..=3)
        .map(|b| {
            let mut r = Raster::filled(32, 64, b as f64);
            r.set_transform(*template.transform());
            r.set_crs(template.crs().cloned());
            r
        })
        .collect();
    write_geotiff_bands(&bands, &path, None).unwrap();

    let bands = read_geotiff_bands(&path).unwrap();
    let sampler = ProjectionSampler::for_raster(&bands[0], None).unwrap();
    let result = scale_values(&bands, &sampler).unwrap();

    let analytic = WebMercatorSampler::new(64, 32);
    let expected_s = analytic.row_scale(3).powi(2);
    assert_relative_eq!(result.bands[2].get(3, 10).unwrap(), 3.0 * expected_s, max_relative = 1e-5);
    assert!(result.summary.areal_range.min >= 1.0);
}
