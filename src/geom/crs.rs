use anyhow::{anyhow, Context, Result};
use proj4rs::proj::Proj as Proj4;
use serde::{Deserialize, Serialize};

use crate::error::AggregationError;

/// The coordinate reference systems a run can encounter.
/// Grid output is geographic; areas are only ever measured in `LaeaEurope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Crs {
    Wgs84,      // EPSG:4326, lon/lat degrees
    Etrs89,     // EPSG:4258, lon/lat degrees
    LaeaEurope, // EPSG:3035, equal-area metres
}

impl Crs {
    /// The equal-area system every area and overlay computation runs in.
    pub const EQUAL_AREA: Crs = Crs::LaeaEurope;

    pub fn from_epsg(code: u32) -> Result<Self, AggregationError> {
        match code {
            4326 => Ok(Crs::Wgs84),
            4258 => Ok(Crs::Etrs89),
            3035 => Ok(Crs::LaeaEurope),
            other => Err(AggregationError::InvalidConfig(format!(
                "unsupported CRS EPSG:{other} (supported: 4326, 4258, 3035)"
            ))),
        }
    }

    #[inline]
    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::Etrs89 => 4258,
            Crs::LaeaEurope => 3035,
        }
    }

    /// Whether coordinates are lon/lat degrees (and thus unusable for area).
    #[inline]
    pub fn is_geographic(&self) -> bool { !matches!(self, Crs::LaeaEurope) }

    #[inline]
    pub fn is_equal_area(&self) -> bool { *self == Self::EQUAL_AREA }

    fn proj4_string(&self) -> &'static str {
        match self {
            Crs::Wgs84 => "+proj=longlat +datum=WGS84 +no_defs +type=crs",
            Crs::Etrs89 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs +type=crs",
            Crs::LaeaEurope => "+proj=laea +lat_0=52 +lon_0=10 +x_0=4321000 +y_0=3210000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs",
        }
    }

    /// Build the PROJ.4 definition for this CRS.
    pub(crate) fn proj(&self) -> Result<Proj4> {
        let proj_string = self.proj4_string();
        Proj4::from_proj_string(proj_string)
            .map_err(|e| anyhow!("{e:?}"))
            .with_context(|| format!("failed to build PROJ.4 for EPSG:{}: {proj_string}", self.epsg()))
    }

    /// Identify the CRS described by the WKT of a shapefile `.prj` sidecar.
    /// Returns `None` for anything outside the supported systems.
    pub fn from_prj_wkt(wkt: &str) -> Option<Self> {
        let wkt = wkt.trim_start_matches('\u{feff}').trim().to_ascii_uppercase();
        if let Some(code) = authority_code(&wkt) {
            if let Ok(crs) = Self::from_epsg(code) { return Some(crs) }
        }

        if wkt.starts_with("PROJCS") || wkt.starts_with("PROJCRS") {
            let laea = wkt.contains("LAMBERT_AZIMUTHAL_EQUAL_AREA")
                || wkt.contains("LAMBERT AZIMUTHAL EQUAL AREA")
                || wkt.contains("LAEA");
            return (laea && wkt.contains("ETRS")).then_some(Crs::LaeaEurope);
        }

        if wkt.starts_with("GEOGCS") || wkt.starts_with("GEOGCRS") {
            if wkt.contains("ETRS") { return Some(Crs::Etrs89) }
            if wkt.contains("WGS") { return Some(Crs::Wgs84) }
        }
        None
    }
}

impl TryFrom<u32> for Crs {
    type Error = AggregationError;
    fn try_from(code: u32) -> Result<Self, Self::Error> { Self::from_epsg(code) }
}

impl From<Crs> for u32 {
    fn from(crs: Crs) -> u32 { crs.epsg() }
}

/// Find the top-level `AUTHORITY["EPSG","<code>"]` (the last one in a WKT1 string).
fn authority_code(wkt: &str) -> Option<u32> {
    let start = wkt.rfind("AUTHORITY[\"EPSG\",")? + "AUTHORITY[\"EPSG\",".len();
    wkt[start..].trim_start_matches([' ', '"'])
        .split(|c: char| !c.is_ascii_digit())
        .next()?
        .parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsg_round_trip() {
        for crs in [Crs::Wgs84, Crs::Etrs89, Crs::LaeaEurope] {
            assert_eq!(Crs::from_epsg(crs.epsg()).unwrap(), crs);
        }
        assert!(Crs::from_epsg(32633).is_err());
    }

    #[test]
    fn only_laea_is_equal_area() {
        assert!(Crs::LaeaEurope.is_equal_area());
        assert!(Crs::Wgs84.is_geographic());
        assert!(Crs::Etrs89.is_geographic());
        assert!(!Crs::LaeaEurope.is_geographic());
    }

    #[test]
    fn prj_detection() {
        let wgs84 = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(Crs::from_prj_wkt(wgs84), Some(Crs::Wgs84));

        let laea = r#"PROJCS["ETRS_1989_LAEA",GEOGCS["GCS_ETRS_1989",DATUM["D_ETRS_1989",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Lambert_Azimuthal_Equal_Area"],PARAMETER["False_Easting",4321000.0],PARAMETER["False_Northing",3210000.0],PARAMETER["Central_Meridian",10.0],PARAMETER["Latitude_Of_Origin",52.0],UNIT["Meter",1.0]]"#;
        assert_eq!(Crs::from_prj_wkt(laea), Some(Crs::LaeaEurope));

        let utm = r#"PROJCS["WGS_1984_UTM_Zone_33N",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]],PROJECTION["Transverse_Mercator"]]"#;
        assert_eq!(Crs::from_prj_wkt(utm), None);
    }

    #[test]
    fn prj_authority_wins() {
        let wkt = r#"PROJCS["ETRS89-extended / LAEA Europe",GEOGCS["ETRS89",AUTHORITY["EPSG","4258"]],AUTHORITY["EPSG","3035"]]"#;
        assert_eq!(Crs::from_prj_wkt(wkt), Some(Crs::LaeaEurope));
    }
}
