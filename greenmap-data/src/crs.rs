//! Coordinate reference systems and reprojection to WGS84
//!
//! Every layer is served in EPSG:4326. Source data is usually British National
//! Grid (EPSG:27700); a few other codes and arbitrary proj strings are accepted.

use greenmap_common::{Error, Result};
use proj4rs::proj::Proj;

/// The CRS every served layer is expressed in
pub const WGS84: Crs = Crs::Epsg(4326);

const WGS84_PROJ: &str = "+proj=longlat +datum=WGS84 +no_defs";
const ETRS89_PROJ: &str = "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs";
const BRITISH_NATIONAL_GRID_PROJ: &str = "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 \
     +x_0=400000 +y_0=-100000 +ellps=airy \
     +towgs84=446.448,-125.157,542.06,0.15,0.247,0.842,-20.489 +units=m +no_defs";
const WEB_MERCATOR_PROJ: &str =
    "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs";

/// A source coordinate reference system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crs {
    /// One of the EPSG codes with a built-in definition
    Epsg(u32),
    /// A raw proj string
    Proj(String),
}

impl Crs {
    /// Build from an EPSG code, rejecting codes without a built-in definition
    pub fn epsg(code: u32) -> Result<Self> {
        match code {
            4326 | 4258 | 27700 | 3857 => Ok(Crs::Epsg(code)),
            // Legacy Google alias of web mercator
            900913 => Ok(Crs::Epsg(3857)),
            other => Err(Error::UnsupportedCrs(format!("EPSG:{other}"))),
        }
    }

    /// Parse the `properties.name` of a legacy GeoJSON `crs` member
    ///
    /// Accepts `EPSG:27700`, `urn:ogc:def:crs:EPSG::27700`,
    /// `urn:ogc:def:crs:EPSG:6.6:27700` and the OGC `CRS84` alias of WGS84.
    pub fn from_geojson_name(name: &str) -> Result<Self> {
        let upper = name.trim().to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Ok(WGS84);
        }

        if upper.contains("EPSG") {
            if let Some(code) = upper.rsplit(':').next().and_then(|c| c.parse::<u32>().ok()) {
                return Self::epsg(code);
            }
        }

        Err(Error::UnsupportedCrs(name.to_string()))
    }

    fn proj_string(&self) -> &str {
        match self {
            Crs::Epsg(4258) => ETRS89_PROJ,
            Crs::Epsg(27700) => BRITISH_NATIONAL_GRID_PROJ,
            Crs::Epsg(3857) => WEB_MERCATOR_PROJ,
            Crs::Epsg(_) => WGS84_PROJ,
            Crs::Proj(definition) => definition,
        }
    }

    /// Geographic systems take degrees in and must be fed to proj as radians
    fn is_geographic(&self) -> bool {
        match self {
            Crs::Epsg(code) => matches!(code, 4326 | 4258),
            Crs::Proj(definition) => {
                definition.contains("+proj=longlat") || definition.contains("+proj=latlong")
            }
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Proj(definition) => write!(f, "{definition}"),
        }
    }
}

/// Transforms coordinates from a source CRS into EPSG:4326
pub struct Reprojector {
    transform: Option<Transform>,
}

struct Transform {
    source: Proj,
    target: Proj,
    source_geographic: bool,
}

impl Reprojector {
    /// Build a reprojector for `source`; identity when it is already WGS84
    pub fn to_wgs84(source: &Crs) -> Result<Self> {
        if *source == WGS84 {
            return Ok(Self { transform: None });
        }

        let parse = |definition: &str| {
            Proj::from_proj_string(definition)
                .map_err(|e| Error::Projection(format!("{source}: {e}")))
        };

        Ok(Self {
            transform: Some(Transform {
                source: parse(source.proj_string())?,
                target: parse(WGS84_PROJ)?,
                source_geographic: source.is_geographic(),
            }),
        })
    }

    pub fn is_identity(&self) -> bool {
        self.transform.is_none()
    }

    /// Transform a single `(x, y)` pair, returning `(longitude, latitude)` in degrees
    pub fn transform_xy(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let Some(t) = &self.transform else {
            return Ok((x, y));
        };

        let mut point = if t.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        proj4rs::transform::transform(&t.source, &t.target, &mut point)
            .map_err(|e| Error::Projection(format!("({x}, {y}): {e}")))?;

        let (lon, lat) = (point.0.to_degrees(), point.1.to_degrees());
        if !lon.is_finite() || !lat.is_finite() {
            return Err(Error::Projection(format!(
                "({x}, {y}) has no WGS84 equivalent"
            )));
        }
        Ok((lon, lat))
    }

    /// Reproject a GeoJSON geometry in place
    ///
    /// Only the first two ordinates of each position are transformed; a third
    /// (elevation) or further ordinates pass through unchanged.
    pub fn reproject_geometry(&self, geometry: &mut geojson::Geometry) -> Result<()> {
        if self.is_identity() {
            return Ok(());
        }

        self.reproject_value(&mut geometry.value)?;
        geometry.bbox = None;
        Ok(())
    }

    fn reproject_value(&self, value: &mut geojson::Value) -> Result<()> {
        use geojson::Value;

        match value {
            Value::Point(position) => self.reproject_position(position),
            Value::MultiPoint(positions) | Value::LineString(positions) => {
                self.reproject_positions(positions)
            }
            Value::MultiLineString(lines) | Value::Polygon(lines) => lines
                .iter_mut()
                .try_for_each(|line| self.reproject_positions(line)),
            Value::MultiPolygon(polygons) => polygons
                .iter_mut()
                .flatten()
                .try_for_each(|ring| self.reproject_positions(ring)),
            Value::GeometryCollection(geometries) => geometries
                .iter_mut()
                .try_for_each(|geometry| self.reproject_geometry(geometry)),
        }
    }

    fn reproject_positions(&self, positions: &mut [geojson::Position]) -> Result<()> {
        positions
            .iter_mut()
            .try_for_each(|position| self.reproject_position(position))
    }

    fn reproject_position(&self, position: &mut geojson::Position) -> Result<()> {
        let (x, y) = match position.as_slice() {
            [x, y, ..] => (*x, *y),
            _ => {
                return Err(Error::Projection(format!(
                    "position {position:?} needs at least two ordinates"
                )))
            }
        };

        let (lon, lat) = self.transform_xy(x, y)?;
        position[0] = lon;
        position[1] = lat;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: (f64, f64), expected: (f64, f64), tolerance: f64) {
        assert!(
            (actual.0 - expected.0).abs() < tolerance && (actual.1 - expected.1).abs() < tolerance,
            "{actual:?} is not within {tolerance} of {expected:?}"
        );
    }

    #[test]
    fn test_parse_geojson_crs_names() {
        assert_eq!(
            Crs::from_geojson_name("urn:ogc:def:crs:EPSG::27700").unwrap(),
            Crs::Epsg(27700)
        );
        assert_eq!(Crs::from_geojson_name("EPSG:4326").unwrap(), WGS84);
        assert_eq!(
            Crs::from_geojson_name("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap(),
            WGS84
        );
        assert_eq!(
            Crs::from_geojson_name("urn:ogc:def:crs:EPSG:6.6:3857").unwrap(),
            Crs::Epsg(3857)
        );
        assert_eq!(Crs::from_geojson_name("EPSG:900913").unwrap(), Crs::Epsg(3857));
    }

    #[test]
    fn test_unsupported_crs() {
        assert!(matches!(
            Crs::from_geojson_name("EPSG:2154"),
            Err(Error::UnsupportedCrs(_))
        ));
        assert!(matches!(
            Crs::from_geojson_name("local grid"),
            Err(Error::UnsupportedCrs(_))
        ));
    }

    #[test]
    fn test_wgs84_is_identity() {
        let reprojector = Reprojector::to_wgs84(&WGS84).unwrap();
        assert!(reprojector.is_identity());
        assert_eq!(reprojector.transform_xy(-3.2, 55.9).unwrap(), (-3.2, 55.9));
    }

    #[test]
    fn test_british_national_grid_to_wgs84() {
        let reprojector = Reprojector::to_wgs84(&Crs::Epsg(27700)).unwrap();

        // Edinburgh Castle
        let lonlat = reprojector.transform_xy(325_150.0, 673_500.0).unwrap();
        assert_close(lonlat, (-3.2, 55.9486), 0.01);

        // False origin of the grid
        let lonlat = reprojector.transform_xy(400_000.0, -100_000.0).unwrap();
        assert_close(lonlat, (-2.0, 49.0), 0.01);
    }

    #[test]
    fn test_web_mercator_to_wgs84() {
        let reprojector = Reprojector::to_wgs84(&Crs::Epsg(3857)).unwrap();
        assert_close(reprojector.transform_xy(0.0, 0.0).unwrap(), (0.0, 0.0), 1e-9);

        let radius = 6_378_137.0_f64;
        let (lon, lat) = (-3.2_f64, 55.95_f64);
        let x = radius * lon.to_radians();
        let y = radius * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
        assert_close(reprojector.transform_xy(x, y).unwrap(), (lon, lat), 1e-3);
    }

    #[test]
    fn test_reproject_polygon_geometry() {
        let reprojector = Reprojector::to_wgs84(&Crs::Epsg(27700)).unwrap();
        let ring = vec![
            vec![325_000.0, 673_000.0],
            vec![326_000.0, 673_000.0],
            vec![326_000.0, 674_000.0],
            vec![325_000.0, 673_000.0],
        ];
        let mut geometry = geojson::Geometry::new(geojson::Value::Polygon(vec![ring]));

        reprojector.reproject_geometry(&mut geometry).unwrap();

        let geojson::Value::Polygon(rings) = &geometry.value else {
            panic!("expected polygon, got {:?}", geometry.value);
        };
        assert_eq!(rings[0].len(), 4);
        for position in &rings[0] {
            assert!((-3.3..-3.1).contains(&position[0]), "lon {}", position[0]);
            assert!((55.9..56.0).contains(&position[1]), "lat {}", position[1]);
        }
    }

    #[test]
    fn test_reproject_geometry_collection() {
        let reprojector = Reprojector::to_wgs84(&Crs::Epsg(27700)).unwrap();
        let mut geometry = geojson::Geometry::new(geojson::Value::GeometryCollection(vec![
            geojson::Geometry::new(geojson::Value::Point(vec![325_150.0, 673_500.0])),
            geojson::Geometry::new(geojson::Value::GeometryCollection(vec![
                geojson::Geometry::new(geojson::Value::LineString(vec![
                    vec![325_000.0, 673_000.0],
                    vec![326_000.0, 674_000.0],
                ])),
            ])),
        ]));

        reprojector.reproject_geometry(&mut geometry).unwrap();

        let geojson::Value::GeometryCollection(members) = &geometry.value else {
            panic!("expected a collection, got {:?}", geometry.value);
        };
        let geojson::Value::Point(point) = &members[0].value else {
            panic!("expected a point, got {:?}", members[0].value);
        };
        assert_close((point[0], point[1]), (-3.2, 55.9486), 0.01);

        let geojson::Value::GeometryCollection(nested) = &members[1].value else {
            panic!("expected a nested collection, got {:?}", members[1].value);
        };
        let geojson::Value::LineString(line) = &nested[0].value else {
            panic!("expected a line, got {:?}", nested[0].value);
        };
        assert!(line.iter().all(|p| (-3.3..-3.1).contains(&p[0])));
    }

    #[test]
    fn test_reprojection_keeps_elevation() {
        let reprojector = Reprojector::to_wgs84(&Crs::Epsg(27700)).unwrap();
        let mut geometry =
            geojson::Geometry::new(geojson::Value::Point(vec![325_150.0, 673_500.0, 42.0]));

        reprojector.reproject_geometry(&mut geometry).unwrap();

        let geojson::Value::Point(point) = &geometry.value else {
            panic!("expected a point, got {:?}", geometry.value);
        };
        assert_eq!(point.len(), 3);
        assert_close((point[0], point[1]), (-3.2, 55.9486), 0.01);
        assert_eq!(point[2], 42.0);
    }

    #[test]
    fn test_short_position_is_an_error() {
        let reprojector = Reprojector::to_wgs84(&Crs::Epsg(27700)).unwrap();
        let mut geometry = geojson::Geometry::new(geojson::Value::Point(vec![325_150.0]));

        let result = reprojector.reproject_geometry(&mut geometry);
        assert!(matches!(result, Err(Error::Projection(_))));
    }

    #[test]
    fn test_custom_proj_string() {
        let crs = Crs::Proj("+proj=longlat +ellps=WGS84 +no_defs".to_string());
        let reprojector = Reprojector::to_wgs84(&crs).unwrap();
        assert_close(reprojector.transform_xy(-3.2, 55.9).unwrap(), (-3.2, 55.9), 1e-6);
    }
}
