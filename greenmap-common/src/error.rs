//! Error types and utilities for the greenmap service
//!
//! Provides the shared error enum and fuzzy matching for mistyped layer names.

use strsim::{jaro_winkler, normalized_levenshtein};
use thiserror::Error as ThisError;

/// Minimum combined similarity for a suggestion to be offered.
const MIN_SUGGESTION_SCORE: f64 = 0.65;

/// Find the best fuzzy match using character-based scoring plus a prefix bonus
///
/// Jaro-Winkler (70%) handles transpositions and shared prefixes, normalized
/// Levenshtein (30%) handles dropped or doubled letters. Names built from
/// several words (`open_spaces`, `community-centres`) also score against each
/// word on its own.
fn find_best_fuzzy_match(input: &str, candidates: &[String]) -> Option<String> {
    if candidates.is_empty() || input.is_empty() {
        return None;
    }

    let input_lower = input.to_lowercase();
    let mut best_match = None;
    let mut best_score = 0.0f64;

    for candidate in candidates {
        let candidate_lower = candidate.to_lowercase();

        let jw_score = jaro_winkler(&input_lower, &candidate_lower);
        let lev_score = normalized_levenshtein(&input_lower, &candidate_lower);
        let combined_score = (jw_score * 0.7) + (lev_score * 0.3);

        let mut bonus = 0.0;

        // Prefix bonus (+20% max) for long shared prefixes
        let prefix_len = input_lower.chars().count().min(7);
        if prefix_len >= 4 {
            let input_prefix = input_lower.chars().take(prefix_len).collect::<String>();
            let candidate_prefix = candidate_lower.chars().take(prefix_len).collect::<String>();

            let prefix_similarity = normalized_levenshtein(&input_prefix, &candidate_prefix);
            if prefix_similarity > 0.7 {
                bonus += 0.2 * prefix_similarity;
            }
        }

        // Word bonus (+12% max) when the input closely matches one word of a compound name
        if candidate_lower.contains(['_', '-']) {
            let best_part = candidate_lower
                .split(['_', '-'])
                .filter(|part| part.len() >= 4)
                .map(|part| jaro_winkler(&input_lower, part))
                .fold(0.0f64, f64::max);
            if best_part > 0.85 {
                bonus += 0.12 * best_part;
            }
        }

        let final_score = combined_score + bonus;

        if final_score >= MIN_SUGGESTION_SCORE && final_score > best_score {
            best_score = final_score;
            best_match = Some(candidate.clone());
        }
    }

    best_match
}

/// Suggest a correction for a potentially misspelled layer name
///
/// Returns `None` when the input already names a candidate (ignoring case) or
/// when nothing is close enough.
pub fn suggest_correction(input: &str, candidates: &[String]) -> Option<String> {
    if candidates.iter().any(|c| c.eq_ignore_ascii_case(input)) {
        return None;
    }

    find_best_fuzzy_match(input, candidates)
}

/// Main error type for greenmap operations
#[derive(Debug, ThisError)]
pub enum Error {
    /// A required credential environment variable is absent or empty
    #[error("{0} not set in environment or .env")]
    MissingCredential(&'static str),

    /// Site reference not present in the sites table
    #[error("Site '{0}' not found")]
    SiteNotFound(String),

    /// Invalid or inconsistent configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unexpected GeoJSON input
    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    /// Coordinate transformation failure
    #[error("Reprojection failed: {0}")]
    Projection(String),

    /// CRS identifier this service cannot handle
    #[error("Unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    /// Database driver or query failure
    #[error("Database error: {0}")]
    Database(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(feature = "geojson")]
impl From<geojson::Error> for Error {
    fn from(err: geojson::Error) -> Self {
        Error::GeoJson(err.to_string())
    }
}

#[cfg(feature = "oracle")]
impl From<oracle::Error> for Error {
    fn from(err: oracle::Error) -> Self {
        Error::Database(err.to_string())
    }
}

/// Convenience result type for greenmap operations
pub type Result<T> = std::result::Result<T, Error>;
