//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Georeferencing is carried by the GeoTIFF tags
//! ModelPixelScale + ModelTiepoint (or ModelTransformation), the EPSG code by
//! the GeoKeyDirectory and no-data by the GDAL_NODATA ASCII tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::any::TypeId;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{
    ColorType as EncodeColorType, Gray32Float, Gray8, RGB32Float, RGBA32Float,
};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tiff::ColorType;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_MODEL_TRANSFORMATION: u16 = 34264;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Sample layout used when writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// 8-bit unsigned, used for masks
    UInt8,
    /// 32-bit IEEE float, used for value rasters
    Float32,
}

impl SampleType {
    /// Natural on-disk layout for cells of type `T`
    pub fn for_element<T: RasterElement>() -> Self {
        if TypeId::of::<T>() == TypeId::of::<u8>() {
            SampleType::UInt8
        } else {
            SampleType::Float32
        }
    }
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Override the sample layout; `None` picks it from the cell type
    pub sample_type: Option<SampleType>,
}

impl GeoTiffOptions {
    pub fn with_sample_type(sample_type: SampleType) -> Self {
        Self {
            sample_type: Some(sample_type),
        }
    }
}

/// Read one band of a GeoTIFF file into a Raster
///
/// `band` is 1-indexed and defaults to the first band.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let mut bands = decode_geotiff::<T, _>(file)?;
    select_band(&mut bands, band)
}

/// Read every band of a GeoTIFF file as `f64` rasters
pub fn read_geotiff_bands<P: AsRef<Path>>(path: P) -> Result<Vec<Raster<f64>>> {
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read one band of a GeoTIFF held in memory
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    let mut bands = decode_geotiff::<T, _>(Cursor::new(data))?;
    select_band(&mut bands, band)
}

/// Read every band of a GeoTIFF held in memory as `f64` rasters
pub fn read_geotiff_bands_from_buffer(data: &[u8]) -> Result<Vec<Raster<f64>>> {
    decode_geotiff(Cursor::new(data))
}

fn select_band<T: RasterElement>(
    bands: &mut Vec<Raster<T>>,
    band: Option<usize>,
) -> Result<Raster<T>> {
    let idx = band.unwrap_or(1);
    if idx == 0 || idx > bands.len() {
        return Err(Error::InvalidParameter {
            name: "band",
            value: idx.to_string(),
            reason: format!("image has {} band(s)", bands.len()),
        });
    }
    Ok(bands.swap_remove(idx - 1))
}

fn samples_per_pixel(color: ColorType) -> Result<usize> {
    match color {
        ColorType::Gray(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) | ColorType::YCbCr(_) => Ok(3),
        ColorType::RGBA(_) | ColorType::CMYK(_) => Ok(4),
        ColorType::Multiband { num_samples, .. } => Ok(num_samples as usize),
        other => Err(Error::UnsupportedDataType(format!("TIFF color type {:?}", other))),
    }
}

macro_rules! cast_samples {
    ($buf:expr) => {
        $buf.iter()
            .map(|&v| num_traits::cast(v).unwrap_or_else(T::fallback))
            .collect()
    };
}

fn convert_samples<T: RasterElement>(result: DecodingResult) -> Result<Vec<T>> {
    let data = match result {
        DecodingResult::U8(buf) => cast_samples!(buf),
        DecodingResult::U16(buf) => cast_samples!(buf),
        DecodingResult::U32(buf) => cast_samples!(buf),
        DecodingResult::U64(buf) => cast_samples!(buf),
        DecodingResult::I8(buf) => cast_samples!(buf),
        DecodingResult::I16(buf) => cast_samples!(buf),
        DecodingResult::I32(buf) => cast_samples!(buf),
        DecodingResult::I64(buf) => cast_samples!(buf),
        DecodingResult::F32(buf) => cast_samples!(buf),
        DecodingResult::F64(buf) => cast_samples!(buf),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF sample format".to_string(),
            ))
        }
    };
    Ok(data)
}

/// Decode all bands from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R) -> Result<Vec<Raster<T>>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let color = decoder
        .colortype()
        .map_err(|e| Error::Other(format!("Cannot read color type: {}", e)))?;
    let spp = samples_per_pixel(color)?;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;
    let samples: Vec<T> = convert_samples(result)?;

    if samples.len() != rows * cols * spp {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let transform = read_geotransform(&mut decoder);
    let crs = read_crs(&mut decoder);
    let nodata = read_nodata(&mut decoder);

    let mut bands = Vec::with_capacity(spp);
    for b in 0..spp {
        let data: Vec<T> = samples.iter().skip(b).step_by(spp).copied().collect();
        let mut raster = Raster::from_vec(data, rows, cols)?;
        if let Some(gt) = transform {
            raster.set_transform(gt);
        }
        raster.set_crs(crs.clone());
        raster.set_nodata(nodata.and_then(num_traits::cast));
        bands.push(raster);
    }
    Ok(bands)
}

/// GeoTransform from the model tags, `None` if the file carries none
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TRANSFORMATION)) {
        if m.len() >= 8 {
            return Some(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
        .ok()?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TIEPOINT))
        .ok()?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }
    None
}

/// EPSG code from the GeoKeyDirectory
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u16_vec(Tag::Unknown(TAG_GEO_KEY_DIRECTORY))
        .ok()?;
    let code = geokey_value(&keys, KEY_PROJECTED_CS_TYPE)
        .or_else(|| geokey_value(&keys, KEY_GEOGRAPHIC_TYPE))
        .filter(|&c| c != 0 && c != 32767)?;
    Some(CRS::from_epsg(code as u32))
}

/// Inline (location 0) value of a key in a GeoKeyDirectory
fn geokey_value(keys: &[u16], key: u16) -> Option<u16> {
    let count = *keys.get(3)? as usize;
    keys.get(4..4 + 4 * count)?
        .chunks_exact(4)
        .find(|entry| entry[0] == key && entry[1] == 0)
        .map(|entry| entry[3])
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(Tag::Unknown(TAG_GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok())
}

fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let geographic = crs.map(CRS::is_geographic).unwrap_or(false);
    let model_type = if geographic {
        MODEL_TYPE_GEOGRAPHIC
    } else {
        MODEL_TYPE_PROJECTED
    };

    let mut entries = vec![
        [KEY_MODEL_TYPE, 0, 1, model_type],
        [KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA],
    ];
    if let Some(code) = crs.and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok()) {
        let key = if geographic {
            KEY_GEOGRAPHIC_TYPE
        } else {
            KEY_PROJECTED_CS_TYPE
        };
        entries.push([key, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.iter().flatten());
    keys
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(std::slice::from_ref(raster), file, options.unwrap_or_default())
}

/// Write 1, 3 or 4 equally sized bands to a GeoTIFF file
pub fn write_geotiff_bands<T, P>(bands: &[Raster<T>], path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(bands, file, options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(
        std::slice::from_ref(raster),
        Cursor::new(&mut buf),
        options.unwrap_or_default(),
    )?;
    Ok(buf)
}

/// Encode bands as one interleaved GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(bands: &[Raster<T>], writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let first = bands
        .first()
        .ok_or_else(|| Error::Other("No bands to write".into()))?;
    for band in &bands[1..] {
        first.ensure_same_shape(band)?;
    }

    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let sample_type = options
        .sample_type
        .unwrap_or_else(SampleType::for_element::<T>);

    match (sample_type, bands.len()) {
        (SampleType::UInt8, 1) => {
            let data: Vec<u8> = interleave(bands, 0u8);
            write_image::<Gray8, _, _>(&mut encoder, first, &data)
        }
        (SampleType::UInt8, n) => Err(Error::UnsupportedDataType(format!(
            "{} bands of 8-bit samples",
            n
        ))),
        (SampleType::Float32, 1) => {
            let data: Vec<f32> = interleave(bands, f32::NAN);
            write_image::<Gray32Float, _, _>(&mut encoder, first, &data)
        }
        (SampleType::Float32, 3) => {
            let data: Vec<f32> = interleave(bands, f32::NAN);
            write_image::<RGB32Float, _, _>(&mut encoder, first, &data)
        }
        (SampleType::Float32, 4) => {
            let data: Vec<f32> = interleave(bands, f32::NAN);
            write_image::<RGBA32Float, _, _>(&mut encoder, first, &data)
        }
        (SampleType::Float32, n) => Err(Error::UnsupportedDataType(format!(
            "{} bands of 32-bit float samples",
            n
        ))),
    }
}

/// Pixel-interleaved samples of all bands, cast to the output type
fn interleave<T, U>(bands: &[Raster<T>], fallback: U) -> Vec<U>
where
    T: RasterElement,
    U: num_traits::NumCast + Copy,
{
    let len = bands.first().map(Raster::len).unwrap_or(0);
    let mut out = Vec::with_capacity(len * bands.len());
    let flat: Vec<Vec<T>> = bands
        .iter()
        .map(|b| b.data().iter().copied().collect())
        .collect();
    for i in 0..len {
        for band in &flat {
            out.push(num_traits::cast(band[i]).unwrap_or(fallback));
        }
    }
    out
}

fn write_image<C, W, T>(encoder: &mut TiffEncoder<W>, meta: &Raster<T>, data: &[C::Inner]) -> Result<()>
where
    C: EncodeColorType,
    W: Write + Seek,
    T: RasterElement,
    [C::Inner]: TiffValue,
{
    let (rows, cols) = meta.shape();
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    if meta.is_georeferenced() {
        let gt = meta.transform();
        if gt.is_rotated() {
            let m = [
                gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
                gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
                0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ];
            image
                .encoder()
                .write_tag(Tag::Unknown(TAG_MODEL_TRANSFORMATION), &m[..])
                .map_err(|e| Error::Other(format!("Cannot write transformation tag: {}", e)))?;
        } else {
            let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
            image
                .encoder()
                .write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), &scale[..])
                .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

            let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
            image
                .encoder()
                .write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), &tiepoint[..])
                .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;
        }
    }

    let geokeys = geokey_directory(meta.crs());
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    if let Some(nodata) = meta.nodata().and_then(|v| v.to_f64()) {
        let text = format!("{}", nodata);
        image
            .encoder()
            .write_tag(Tag::Unknown(TAG_GDAL_NODATA), text.as_str())
            .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
    }

    image
        .write_data(data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
    Ok(())
}
