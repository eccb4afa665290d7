//! I/O operations for reading and writing geospatial data

#[cfg(feature = "gdal")]
mod gdal_io;
mod native;

pub use native::{GeoTiffOptions, SampleType};

#[cfg(feature = "gdal")]
pub use gdal_io::{read_geotiff, read_geotiff_bands, write_geotiff, write_geotiff_bands};

#[cfg(not(feature = "gdal"))]
pub use native::{read_geotiff, read_geotiff_bands, write_geotiff, write_geotiff_bands};

// Buffer-based I/O (always available, no filesystem dependency)
pub use native::{
    read_geotiff_bands_from_buffer, read_geotiff_from_buffer, write_geotiff_to_buffer,
};
