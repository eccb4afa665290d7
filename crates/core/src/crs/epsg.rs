//! Built-in PROJ definitions for common EPSG codes
//!
//! Covers the projected systems masks are usually delivered in. UTM zones
//! (EPSG 326xx north, 327xx south) are generated; everything else is a
//! fixed table. Unknown codes need an explicit PROJ string.

use std::sync::OnceLock;

const FIXED: &[(u32, &str)] = &[
    (4326, "+proj=longlat +datum=WGS84 +no_defs"),
    (4258, "+proj=longlat +ellps=GRS80 +no_defs"),
    (4269, "+proj=longlat +datum=NAD83 +no_defs"),
    (
        3857,
        "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs",
    ),
    (
        900913,
        "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs",
    ),
    (3395, "+proj=merc +lon_0=0 +k=1 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs"),
    (
        3035,
        "+proj=laea +lat_0=52 +lon_0=10 +x_0=4321000 +y_0=3210000 +ellps=GRS80 +units=m +no_defs",
    ),
    (
        3413,
        "+proj=stere +lat_0=90 +lat_ts=70 +lon_0=-45 +k=1 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs",
    ),
    (
        3031,
        "+proj=stere +lat_0=-90 +lat_ts=-71 +lon_0=0 +k=1 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs",
    ),
    (
        2154,
        "+proj=lcc +lat_0=46.5 +lon_0=3 +lat_1=49 +lat_2=44 +x_0=700000 +y_0=6600000 +ellps=GRS80 +units=m +no_defs",
    ),
    (
        27700,
        "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 +x_0=400000 +y_0=-100000 +ellps=airy +units=m +no_defs",
    ),
    (25832, "+proj=utm +zone=32 +ellps=GRS80 +units=m +no_defs"),
    (25833, "+proj=utm +zone=33 +ellps=GRS80 +units=m +no_defs"),
    (
        5070,
        "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs",
    ),
];

/// Parse an EPSG code into UTM zone info: `Some((zone, is_north))`.
///
/// - EPSG 326xx → zone xx, northern hemisphere
/// - EPSG 327xx → zone xx, southern hemisphere
fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

fn utm_definitions() -> &'static Vec<(u32, String)> {
    static UTM: OnceLock<Vec<(u32, String)>> = OnceLock::new();
    UTM.get_or_init(|| {
        (32601..=32660)
            .chain(32701..=32760)
            .filter_map(|code| {
                let (zone, north) = parse_utm_epsg(code)?;
                let south = if north { "" } else { " +south" };
                Some((
                    code,
                    format!("+proj=utm +zone={zone}{south} +datum=WGS84 +units=m +no_defs"),
                ))
            })
            .collect()
    })
}

/// PROJ definition for an EPSG code, if the code is known
pub fn proj_string_for_epsg(code: u32) -> Option<&'static str> {
    if parse_utm_epsg(code).is_some() {
        return utm_definitions()
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, def)| def.as_str());
    }
    FIXED
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, def)| *def)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utm_zones() {
        assert_eq!(
            proj_string_for_epsg(32633),
            Some("+proj=utm +zone=33 +datum=WGS84 +units=m +no_defs")
        );
        assert_eq!(
            proj_string_for_epsg(32719),
            Some("+proj=utm +zone=19 +south +datum=WGS84 +units=m +no_defs")
        );
        assert_eq!(proj_string_for_epsg(32661), None);
    }

    #[test]
    fn fixed_codes() {
        assert!(proj_string_for_epsg(3857).unwrap().contains("+a=6378137 +b=6378137"));
        assert!(proj_string_for_epsg(3035).unwrap().starts_with("+proj=laea"));
        assert_eq!(proj_string_for_epsg(1), None);
    }
}
