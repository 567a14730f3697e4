//! Per-request site detail lookup
//!
//! The site row is fetched by its reference, then each configured join reads a
//! foreign key out of an already-fetched record and queries the next table.
//! Everything is sequential; a broken link further down the chain leaves a
//! `null` under that name instead of failing the whole request.

use greenmap_common::config::SiteDetailsConfig;
use greenmap_common::Result;
use serde_json::Value;

use crate::store::{KeyValue, Record, RecordStore};

/// Nested mapping returned by `/site_details`: record name to row (or `null`)
pub type SiteDetails = serde_json::Map<String, Value>;

/// Assemble the details of one site
///
/// Returns `Ok(None)` when no site has the given reference.
pub fn get_site_details(
    store: &dyn RecordStore,
    config: &SiteDetailsConfig,
    reference: &str,
) -> Result<Option<SiteDetails>> {
    let key = KeyValue::Text(reference.to_string());
    let Some(site) = store.fetch_by_key(&config.table, &config.key_column, &key)? else {
        tracing::debug!(reference, "site not found");
        return Ok(None);
    };

    let mut details = SiteDetails::new();
    details.insert(config.name.clone(), Value::Object(site));

    for join in &config.joins {
        let foreign_key = details
            .get(&join.from)
            .and_then(Value::as_object)
            .and_then(|parent| parent.get(&join.from_column))
            .and_then(KeyValue::from_json);

        let row = match foreign_key {
            Some(foreign_key) => {
                store.fetch_by_key(&join.table, &join.key_column, &foreign_key)?
            }
            None => None,
        };

        if row.is_none() {
            tracing::debug!(
                reference,
                join = %join.name,
                table = %join.table,
                "no related row"
            );
        }
        details.insert(join.name.clone(), row.map_or(Value::Null, Value::Object));
    }

    for projection in &config.projections {
        let projected = details
            .get(&projection.from)
            .and_then(Value::as_object)
            .map(|source| project_columns(source, &projection.columns));
        details.insert(projection.name.clone(), projected.map_or(Value::Null, Value::Object));
    }

    Ok(Some(details))
}

fn project_columns(source: &Record, columns: &[String]) -> Record {
    columns
        .iter()
        .map(|column| (column.clone(), source.get(column).cloned().unwrap_or(Value::Null)))
        .collect()
}
