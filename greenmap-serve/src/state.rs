//! Server state - layers loaded at startup plus the record store for lookups

use greenmap_common::config::SiteDetailsConfig;
use greenmap_common::{AppConfig, Result};
use greenmap_data::{LayerCatalog, RecordStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Shared state handed to every request handler
pub struct ServerState {
    /// Reprojected layers, immutable after startup
    pub catalog: LayerCatalog,
    /// Queried per request by `/site_details`
    pub store: Arc<dyn RecordStore>,
    /// `None` disables `/site_details`
    pub site_details: Option<Arc<SiteDetailsConfig>>,
    pub static_dir: PathBuf,
}

impl ServerState {
    pub fn new(
        catalog: LayerCatalog,
        store: Arc<dyn RecordStore>,
        site_details: Option<SiteDetailsConfig>,
        static_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            store,
            site_details: site_details.map(Arc::new),
            static_dir: static_dir.into(),
        }
    }

    /// Load every configured layer
    ///
    /// Blocking: file reads and table queries run on the calling thread.
    pub fn load(config: &AppConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        let start = Instant::now();
        let catalog = LayerCatalog::load(config, store.as_ref())?;
        tracing::info!(
            layers = catalog.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "layers loaded"
        );

        Ok(Self::new(
            catalog,
            store,
            config.site_details.clone(),
            config.server.static_dir.clone(),
        ))
    }
}
