//! Date normalization
//!
//! JSON has no date type, so date columns are rendered as `%Y-%m-%d` strings
//! before anything is serialized.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use geojson::FeatureCollection;
use serde_json::Value;

/// Output format for every date column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Render a date-time as the service's date string
pub fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATE_FORMAT).to_string()
}

/// Parse the textual date shapes found in exported GeoJSON
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    // Offsets without a colon, e.g. `2019/05/01 00:00:00+00`
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y/%m/%d %H:%M:%S%#z") {
        return Some(dt.date_naive());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt.date());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Normalize one property value
///
/// Strings are parsed as dates, integers are epoch milliseconds. `null` and
/// values that do not look like dates come back unchanged.
pub fn normalize_date_value(value: &Value) -> Option<Value> {
    let date = match value {
        Value::String(text) => parse_date(text)?,
        Value::Number(number) => {
            let millis = number.as_i64()?;
            DateTime::from_timestamp_millis(millis)?.date_naive()
        }
        _ => return None,
    };
    Some(Value::String(date.format(DATE_FORMAT).to_string()))
}

/// Rewrite the named date columns of every feature
///
/// Returns the number of values that could not be read as dates; those are
/// left as they were.
pub fn normalize_date_columns(collection: &mut FeatureCollection, columns: &[String]) -> usize {
    if columns.is_empty() {
        return 0;
    }

    let mut unparsed = 0;
    for feature in &mut collection.features {
        let Some(properties) = feature.properties.as_mut() else {
            continue;
        };
        for column in columns {
            let Some(value) = properties.get_mut(column) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            match normalize_date_value(value) {
                Some(normalized) => *value = normalized,
                None => {
                    tracing::warn!(column = %column, value = %value, "unrecognised date value");
                    unparsed += 1;
                }
            }
        }
    }
    unparsed
}
