//! Raw query bindings → canonical artwork rows.
//!
//! Pure and deterministic; the pipeline owns logging and counting. A row is
//! skipped (returns `None`) only when one of the three identity labels is
//! missing, empty, or an untranslated entity placeholder. Bad geometry never
//! rejects a row; it just comes back with no coordinates.

use artatlas_snapshot::{ArtworkRecord, UNKNOWN_PLACE};

use crate::client::Binding;

/// Convert one result binding into a record, or skip it.
pub fn normalize(binding: &Binding) -> Option<ArtworkRecord> {
    let painter = human_label(binding.get("painterLabel"))?;
    let painting = human_label(binding.get("paintingLabel"))?;
    let museum = human_label(binding.get("museumLabel"))?;

    let city = place_or_unknown(binding.get("cityLabel"));
    let country = place_or_unknown(binding.get("countryLabel"));

    let (latitude, longitude) = match binding.get("coords").and_then(|s| parse_point(s)) {
        Some((lat, lon)) => (Some(lat), Some(lon)),
        None => (None, None),
    };

    Some(ArtworkRecord {
        painter,
        painting,
        museum,
        city,
        country,
        latitude,
        longitude,
    })
}

/// Untranslated entities come back as the bare identifier: `Q` followed by
/// digits (dashes tolerated, as in ranged identifiers).
pub fn is_entity_placeholder(label: &str) -> bool {
    let Some(rest) = label.strip_prefix('Q') else {
        return false;
    };
    let mut saw_digit = false;
    for c in rest.chars() {
        if c == '-' {
            continue;
        }
        if !c.is_ascii_digit() {
            return false;
        }
        saw_digit = true;
    }
    saw_digit
}

fn human_label(value: Option<&String>) -> Option<String> {
    let label = value.map(String::as_str).unwrap_or("");
    if label.is_empty() || is_entity_placeholder(label) {
        None
    } else {
        Some(label.to_string())
    }
}

fn place_or_unknown(value: Option<&String>) -> String {
    match value.map(String::as_str) {
        Some(label) if !label.is_empty() && !is_entity_placeholder(label) => label.to_string(),
        _ => UNKNOWN_PLACE.to_string(),
    }
}

/// Parse the WKT-style `Point(<lon> <lat>)` literal into `(lat, lon)`.
///
/// Anything that does not parse cleanly, or lands outside the valid
/// latitude/longitude ranges, yields `None` for both axes.
pub fn parse_point(text: &str) -> Option<(f64, f64)> {
    let inner = text.strip_prefix("Point(")?.strip_suffix(')')?;
    let (lon, lat) = inner.split_once(' ')?;
    let lon: f64 = lon.trim().parse().ok()?;
    let lat: f64 = lat.trim().parse().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some((lat, lon))
}
