//! GeoTIFF reading and writing using GDAL

use super::native::{GeoTiffOptions, SampleType};
use crate::crs::{proj_string_for_epsg, CRS};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use std::path::Path;

/// CRS of a dataset: EPSG when the built-in table knows it, else PROJ
fn dataset_crs(dataset: &Dataset) -> Option<CRS> {
    let srs = dataset.spatial_ref().ok()?;
    let code = srs.auth_code().ok().map(|c| c as u32);
    match code {
        Some(code) if proj_string_for_epsg(code).is_some() => Some(CRS::from_epsg(code)),
        _ => {
            let crs = match srs.to_proj4() {
                Ok(proj) => CRS::from_proj(proj.trim()),
                Err(_) => CRS::from_wkt(srs.to_wkt().ok()?),
            };
            Some(match code {
                Some(code) => crs.with_epsg(code),
                None => crs,
            })
        }
    }
}

fn read_band<T>(dataset: &Dataset, index: usize, crs: Option<&CRS>) -> Result<Raster<T>>
where
    T: RasterElement + GdalType,
{
    let rasterband = dataset.rasterband(index)?;
    let (cols, rows) = dataset.raster_size();
    let buffer = rasterband.read_as::<T>((0, 0), (cols, rows), (cols, rows), None)?;

    let mut raster = Raster::from_vec(buffer.data().to_vec(), rows, cols)?;
    if let Ok(gt) = dataset.geo_transform() {
        raster.set_transform(GeoTransform::from_gdal(gt));
    }
    raster.set_crs(crs.cloned());
    if let Some(nodata) = rasterband.no_data_value() {
        raster.set_nodata(num_traits::cast(nodata));
    }
    Ok(raster)
}

/// Read one band (1-indexed, default 1) of a GeoTIFF file
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement + GdalType,
    P: AsRef<Path>,
{
    let dataset = Dataset::open(path.as_ref())?;
    let crs = dataset_crs(&dataset);
    read_band(&dataset, band.unwrap_or(1), crs.as_ref())
}

/// Read every band of a GeoTIFF file as `f64` rasters
pub fn read_geotiff_bands<P: AsRef<Path>>(path: P) -> Result<Vec<Raster<f64>>> {
    let dataset = Dataset::open(path.as_ref())?;
    let crs = dataset_crs(&dataset);
    (1..=dataset.raster_count())
        .map(|b| read_band(&dataset, b, crs.as_ref()))
        .collect()
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    write_geotiff_bands(std::slice::from_ref(raster), path, options)
}

/// Write equally sized bands to one GeoTIFF file
///
/// Cells are cast to the requested sample type (8-bit for `u8` rasters,
/// 32-bit float otherwise).
pub fn write_geotiff_bands<T, P>(bands: &[Raster<T>], path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let first = bands
        .first()
        .ok_or_else(|| Error::Other("No bands to write".into()))?;
    for band in &bands[1..] {
        first.ensure_same_shape(band)?;
    }
    let sample_type = options
        .unwrap_or_default()
        .sample_type
        .unwrap_or_else(SampleType::for_element::<T>);

    match sample_type {
        SampleType::UInt8 => create_dataset::<T, u8>(bands, path.as_ref()),
        SampleType::Float32 => create_dataset::<T, f32>(bands, path.as_ref()),
    }
}

fn create_dataset<T, U>(bands: &[Raster<T>], path: &Path) -> Result<()>
where
    T: RasterElement,
    U: RasterElement + GdalType,
{
    let first = &bands[0];
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (rows, cols) = first.shape();
    let create_options = ["COMPRESS=DEFLATE"];

    let mut dataset = driver.create_with_band_type_with_options::<U, _>(
        path,
        cols as isize,
        rows as isize,
        bands.len() as isize,
        &create_options,
    )?;

    if first.is_georeferenced() {
        dataset.set_geo_transform(&first.transform().to_gdal())?;
    }

    if let Some(crs) = first.crs() {
        if let Some(epsg) = crs.epsg() {
            dataset.set_spatial_ref(&SpatialRef::from_epsg(epsg)?)?;
        } else if let Some(proj) = crs.proj() {
            dataset.set_spatial_ref(&SpatialRef::from_proj4(proj)?)?;
        } else if let Some(wkt) = crs.wkt() {
            dataset.set_spatial_ref(&SpatialRef::from_wkt(wkt)?)?;
        }
    }

    for (i, raster) in bands.iter().enumerate() {
        let mut band = dataset.rasterband(i + 1)?;
        if let Some(nodata) = raster.nodata().and_then(|v| v.to_f64()) {
            band.set_no_data_value(Some(nodata))?;
        }
        let data: Vec<U> = raster
            .data()
            .iter()
            .map(|&v| num_traits::cast(v).unwrap_or_else(U::fallback))
            .collect();
        let mut buffer = Buffer::new((cols, rows), data);
        band.write((0, 0), (cols, rows), &mut buffer)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_values_written_as_float() {
        let mut raster: Raster<f64> = Raster::filled(4, 4, 2.5);
        raster.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&raster, tmp.path(), None).unwrap();
        let loaded: Raster<f32> = read_geotiff(tmp.path(), None).unwrap();
        assert_eq!(loaded.get(3, 3).unwrap(), 2.5);
    }

    #[test]
    fn test_mask_roundtrip() {
        let mut mask: Raster<u8> = Raster::new(20, 30);
        mask.set_transform(GeoTransform::new(500_000.0, 4_600_000.0, 10.0, -10.0));
        mask.set_crs(Some(CRS::from_epsg(32633)));
        mask.set(10, 10, 255).unwrap();

        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&mask, tmp.path(), None).unwrap();

        let loaded: Raster<u8> = read_geotiff(tmp.path(), None).unwrap();
        assert_eq!(loaded.shape(), mask.shape());
        assert_eq!(loaded.get(10, 10).unwrap(), 255);
        assert_eq!(loaded.crs().and_then(CRS::epsg), Some(32633));
    }
}
