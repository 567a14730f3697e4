//! GeoJSON file sources

use geojson::{Feature, FeatureCollection, GeoJson};
use greenmap_common::{Error, Result};
use std::path::Path;

use crate::crs::{Crs, WGS84};

/// Read a GeoJSON file as a feature collection
///
/// A lone `Feature` or `Geometry` is wrapped into a one-element collection.
pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    parse_feature_collection(&text)
        .map_err(|e| Error::GeoJson(format!("{}: {e}", path.display())))
}

/// Parse GeoJSON text as a feature collection
pub fn parse_feature_collection(text: &str) -> Result<FeatureCollection> {
    let collection = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(feature) => FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        GeoJson::Geometry(geometry) => FeatureCollection {
            bbox: None,
            features: vec![Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            foreign_members: None,
        },
    };
    Ok(collection)
}

/// The CRS a collection declares through the legacy `crs` member, if any
pub fn declared_crs(collection: &FeatureCollection) -> Result<Option<Crs>> {
    let name = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.pointer("/properties/name"))
        .and_then(|name| name.as_str());

    name.map(Crs::from_geojson_name).transpose()
}

/// Pick the source CRS: declared in the file, else configured, else WGS84
pub fn source_crs(collection: &FeatureCollection, configured: Option<Crs>) -> Result<Crs> {
    if let Some(crs) = declared_crs(collection)? {
        return Ok(crs);
    }
    Ok(configured.unwrap_or(WGS84))
}

/// Drop the `crs` member once coordinates are WGS84
pub fn clear_declared_crs(collection: &mut FeatureCollection) {
    if let Some(members) = collection.foreign_members.as_mut() {
        members.remove("crs");
        if members.is_empty() {
            collection.foreign_members = None;
        }
    }
}
