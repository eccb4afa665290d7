//! Coordinate Reference System handling

mod epsg;
mod projection;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use epsg::proj_string_for_epsg;
pub use projection::{Ellipsoid, ProjEngine, Projection, ScaleFactors};

/// EPSG code of spherical Web Mercator
pub const EPSG_WEB_MERCATOR: u32 = 3857;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(EPSG_WEB_MERCATOR)
    }

    /// Attach an EPSG code
    pub fn with_epsg(mut self, code: u32) -> Self {
        self.epsg = Some(code);
        self
    }

    /// Attach a PROJ string
    pub fn with_proj(mut self, proj: impl Into<String>) -> Self {
        self.proj = Some(proj.into());
        self
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// PROJ definition usable by [`ProjEngine`].
    ///
    /// An explicit PROJ string wins; otherwise the EPSG code is looked up in
    /// the built-in table. WKT-only CRSs resolve to `None`.
    pub fn proj_definition(&self) -> Option<String> {
        if let Some(proj) = &self.proj {
            return Some(proj.clone());
        }
        self.epsg.and_then(proj_string_for_epsg).map(str::to_string)
    }

    /// Whether the CRS is geographic (lon/lat axes)
    pub fn is_geographic(&self) -> bool {
        match self.proj_definition() {
            Some(def) => is_geographic_definition(&def),
            None => false,
        }
    }

    /// Whether this is spherical Web Mercator
    pub fn is_web_mercator(&self) -> bool {
        if self.epsg == Some(EPSG_WEB_MERCATOR) || self.epsg == Some(900913) {
            return true;
        }
        match &self.proj {
            Some(def) => {
                def.contains("+proj=webmerc")
                    || (def.contains("+proj=merc")
                        && def.contains("+a=6378137")
                        && def.contains("+b=6378137"))
            }
            None => false,
        }
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", wkt.chars().take(50).collect::<String>());
        }
        "Unknown".to_string()
    }
}

/// Whether a PROJ definition describes a lon/lat system
pub(crate) fn is_geographic_definition(def: &str) -> bool {
    def.split_whitespace()
        .any(|t| matches!(t, "+proj=longlat" | "+proj=latlong" | "+proj=lonlat" | "+proj=latlon"))
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(32633);
        assert_eq!(crs.epsg(), Some(32633));
        assert_eq!(crs.identifier(), "EPSG:32633");
        assert!(crs.proj_definition().unwrap().contains("+zone=33"));
    }

    #[test]
    fn test_explicit_proj_wins() {
        let crs = CRS::from_epsg(3857).with_proj("+proj=utm +zone=10 +datum=WGS84");
        assert_eq!(crs.proj_definition().as_deref(), Some("+proj=utm +zone=10 +datum=WGS84"));
    }

    #[test]
    fn test_wkt_only_has_no_definition() {
        let crs = CRS::from_wkt("PROJCS[\"unknown\"]");
        assert_eq!(crs.proj_definition(), None);
        assert!(!crs.is_geographic());
    }

    #[test]
    fn test_geographic_detection() {
        assert!(CRS::from_epsg(4326).is_geographic());
        assert!(CRS::from_proj("+proj=longlat +datum=WGS84").is_geographic());
        assert!(!CRS::web_mercator().is_geographic());
    }

    #[test]
    fn test_web_mercator_detection() {
        assert!(CRS::web_mercator().is_web_mercator());
        assert!(CRS::from_proj("+proj=merc +a=6378137 +b=6378137 +units=m").is_web_mercator());
        assert!(!CRS::from_proj("+proj=merc +datum=WGS84").is_web_mercator());
        assert!(!CRS::from_epsg(32633).is_web_mercator());
    }
}
