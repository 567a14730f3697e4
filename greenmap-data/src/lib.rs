//! Dataset loading for greenmap
//!
//! Layers come from GeoJSON files or database tables, are reprojected to
//! EPSG:4326 and have their date columns rendered as plain strings before they
//! are held in a [`LayerCatalog`] for the lifetime of the process.

pub mod catalog;
pub mod crs;
pub mod dates;
pub mod site_details;
pub mod source;
pub mod store;

pub use catalog::{Layer, LayerCatalog, LayerSummary};
pub use crs::{Crs, Reprojector};
pub use site_details::{get_site_details, SiteDetails};
pub use store::{KeyValue, MemoryStore, Record, RecordStore};

#[cfg(feature = "oracle")]
pub use store::OracleStore;
