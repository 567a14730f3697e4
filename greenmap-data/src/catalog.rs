//! The process-wide set of loaded layers

use geo::BoundingRect;
use geojson::{Feature, FeatureCollection, Geometry, Value as GeoValue};
use greenmap_common::config::{AppConfig, LayerConfig, LayerSource};
use greenmap_common::{Error, Result};
use serde_json::Value;
use std::time::Instant;

use crate::crs::{Crs, Reprojector, WGS84};
use crate::dates::normalize_date_columns;
use crate::source::{clear_declared_crs, read_feature_collection, source_crs};
use crate::store::{Record, RecordStore};

/// Counts and extent of a loaded layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSummary {
    pub name: String,
    /// Human-readable origin, e.g. a file path or `table SITES`
    pub source: String,
    pub feature_count: usize,
    /// `[min_lon, min_lat, max_lon, max_lat]` in EPSG:4326
    pub bbox: Option<[f64; 4]>,
}

/// A dataset ready to serve, already in EPSG:4326
#[derive(Debug, Clone)]
pub struct Layer {
    collection: FeatureCollection,
    summary: LayerSummary,
}

impl Layer {
    pub fn new(name: impl Into<String>, source: impl Into<String>, collection: FeatureCollection) -> Self {
        let summary = LayerSummary {
            name: name.into(),
            source: source.into(),
            feature_count: collection.features.len(),
            bbox: collection_bbox(&collection),
        };
        Self {
            collection,
            summary,
        }
    }

    pub fn name(&self) -> &str {
        &self.summary.name
    }

    pub fn summary(&self) -> &LayerSummary {
        &self.summary
    }

    pub fn collection(&self) -> &FeatureCollection {
        &self.collection
    }

    /// Serialize as a GeoJSON `FeatureCollection`
    pub fn to_geojson(&self) -> Result<String> {
        serde_json::to_string(&self.collection).map_err(|e| Error::GeoJson(e.to_string()))
    }
}

/// Loaded layers in configuration order
#[derive(Debug, Clone, Default)]
pub struct LayerCatalog {
    layers: Vec<Layer>,
}

impl LayerCatalog {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    /// Load every configured layer
    ///
    /// File layers are read relative to `data_dir`; table layers come from
    /// `store`. Any failure aborts the whole load.
    pub fn load(config: &AppConfig, store: &dyn RecordStore) -> Result<Self> {
        let mut layers = Vec::with_capacity(config.layers.len());
        for layer_config in &config.layers {
            let started = Instant::now();
            let layer = load_layer(config, layer_config, store)?;
            let summary = layer.summary();
            tracing::info!(
                layer = %summary.name,
                source = %summary.source,
                features = summary.feature_count,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "loaded layer"
            );
            layers.push(layer);
        }
        Ok(Self { layers })
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.name().to_string()).collect()
    }

    pub fn summaries(&self) -> impl Iterator<Item = &LayerSummary> {
        self.layers.iter().map(Layer::summary)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

fn load_layer(config: &AppConfig, layer: &LayerConfig, store: &dyn RecordStore) -> Result<Layer> {
    let (mut collection, crs, source) = match &layer.source {
        LayerSource::File { path } => {
            let path = config.resolve_data_path(path);
            let collection = read_feature_collection(&path)?;
            let crs = source_crs(&collection, configured_crs(layer)?)?;
            (collection, crs, path.display().to_string())
        }
        LayerSource::Table {
            table,
            x_column,
            y_column,
        } => {
            let rows = store.fetch_all(table)?;
            let coordinates = x_column.as_deref().zip(y_column.as_deref());
            let collection = records_to_collection(rows, coordinates);
            let crs = configured_crs(layer)?.unwrap_or(WGS84);
            (collection, crs, format!("table {table}"))
        }
    };

    reproject_collection(&mut collection, &crs)
        .map_err(|e| Error::Projection(format!("layer '{}': {e}", layer.name)))?;
    clear_declared_crs(&mut collection);

    let unparsed = normalize_date_columns(&mut collection, &layer.date_columns);
    if unparsed > 0 {
        tracing::warn!(layer = %layer.name, unparsed, "some date values were left as-is");
    }

    Ok(Layer::new(&layer.name, source, collection))
}

/// The CRS a layer's configuration names, if any
fn configured_crs(layer: &LayerConfig) -> Result<Option<Crs>> {
    match (&layer.source_proj, layer.source_epsg) {
        (Some(definition), _) => Ok(Some(Crs::Proj(definition.clone()))),
        (None, Some(code)) => Crs::epsg(code).map(Some),
        (None, None) => Ok(None),
    }
}

/// Reproject every feature geometry of a collection to EPSG:4326
pub fn reproject_collection(collection: &mut FeatureCollection, crs: &Crs) -> Result<()> {
    let reprojector = Reprojector::to_wgs84(crs)?;
    if reprojector.is_identity() {
        return Ok(());
    }

    for feature in &mut collection.features {
        if let Some(geometry) = feature.geometry.as_mut() {
            reprojector.reproject_geometry(geometry)?;
        }
        feature.bbox = None;
    }
    collection.bbox = None;
    Ok(())
}

/// Turn table rows into features, with point geometry from two columns
///
/// Rows lacking a numeric value in either column get a null geometry. The
/// coordinate columns stay in the properties.
pub fn records_to_collection(rows: Vec<Record>, coordinates: Option<(&str, &str)>) -> FeatureCollection {
    let features = rows
        .into_iter()
        .map(|row| {
            let geometry = coordinates.and_then(|(x, y)| {
                let x = row.get(x).and_then(Value::as_f64)?;
                let y = row.get(y).and_then(Value::as_f64)?;
                Some(Geometry::new(GeoValue::Point(vec![x, y])))
            });
            Feature {
                bbox: None,
                geometry,
                id: None,
                properties: Some(row),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn collection_bbox(collection: &FeatureCollection) -> Option<[f64; 4]> {
    collection
        .features
        .iter()
        .filter_map(|feature| feature.geometry.as_ref())
        .filter_map(|geometry| geo::Geometry::<f64>::try_from(geometry.value.clone()).ok())
        .filter_map(|geometry| geometry.bounding_rect())
        .map(|rect| [rect.min().x, rect.min().y, rect.max().x, rect.max().y])
        .reduce(|a, b| [a[0].min(b[0]), a[1].min(b[1]), a[2].max(b[2]), a[3].max(b[3])])
}
