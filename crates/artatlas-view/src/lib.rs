//! Filtered views over a loaded snapshot.
//!
//! [`query`] is the single entry point: given a snapshot and an optional
//! (artist, museum) selection it computes the matching row subset, the
//! ranked marker set for the map, and fresh summary counts. It is a pure
//! function of its arguments — no caching, no state, safe to call
//! concurrently from any number of display contexts. Empty results are
//! ordinary values, never errors; the caller gets enough classification to
//! word the message ("nothing matches this artist" vs "this artist has
//! nothing in this museum").

use std::collections::{BTreeSet, HashMap};

use artatlas_snapshot::{ArtworkRecord, Snapshot};

/// Marker cap under an artist filter; beyond this the view keeps the
/// museums with the most matching paintings and reports the truncation.
pub const MARKER_LIMIT: usize = 10;

// ============================================================================
// Filter input
// ============================================================================

/// Exact-match selection. `None` means "all". Matching is case-sensitive
/// against the canonical stored strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    pub artist: Option<String>,
    pub museum: Option<String>,
}

impl ViewFilter {
    pub fn artist(name: impl Into<String>) -> Self {
        Self {
            artist: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn museum(name: impl Into<String>) -> Self {
        Self {
            museum: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_museum(mut self, name: impl Into<String>) -> Self {
        self.museum = Some(name.into());
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.artist.is_none() && self.museum.is_none()
    }

    fn matches(&self, record: &ArtworkRecord) -> bool {
        self.artist.as_ref().map_or(true, |a| record.painter == *a)
            && self.museum.as_ref().map_or(true, |m| record.museum == *m)
    }
}

// ============================================================================
// View output
// ============================================================================

/// One museum on the map under the active filter.
#[derive(Debug, Clone, PartialEq)]
pub struct MuseumMarker {
    pub museum: String,
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub painting_count: usize,
    pub paintings: Vec<String>,
}

/// Emitted when an artist's museum list was cut down to [`MARKER_LIMIT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationNotice {
    pub shown: usize,
    pub total: usize,
    pub artist: String,
    pub remaining: usize,
}

/// Why a view came back with zero rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// Some active filter matches nothing in the snapshot at all.
    FilterUnmatched,
    /// Each active filter matches on its own; the combination is empty.
    EmptyIntersection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub rows: usize,
    pub painters: usize,
    pub museums: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilteredView {
    /// Every matching row, including those without coordinates.
    pub rows: Vec<ArtworkRecord>,
    /// Coordinate-bearing museums only, ranked (count desc, name asc).
    pub markers: Vec<MuseumMarker>,
    pub truncation: Option<TruncationNotice>,
    pub summary: Summary,
    /// `None` when the view has rows; otherwise why it is empty.
    pub empty_reason: Option<EmptyReason>,
}

impl FilteredView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Query
// ============================================================================

/// Compute the filtered view for one (artist, museum) selection.
pub fn query(snapshot: &Snapshot, filter: &ViewFilter) -> FilteredView {
    let rows: Vec<ArtworkRecord> = snapshot
        .records()
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();

    let empty_reason = classify_empty(snapshot, filter, &rows);

    let mut markers = aggregate_markers(&rows);
    let total_museums = markers.len();

    let truncation = match &filter.artist {
        Some(artist) if total_museums > MARKER_LIMIT => {
            markers.truncate(MARKER_LIMIT);
            Some(TruncationNotice {
                shown: MARKER_LIMIT,
                total: total_museums,
                artist: artist.clone(),
                remaining: total_museums - MARKER_LIMIT,
            })
        }
        _ => None,
    };

    let summary = Summary {
        rows: rows.len(),
        painters: distinct(&rows, |r| r.painter.as_str()),
        museums: distinct(&rows, |r| r.museum.as_str()),
    };

    FilteredView {
        rows,
        markers,
        truncation,
        summary,
        empty_reason,
    }
}

fn classify_empty(
    snapshot: &Snapshot,
    filter: &ViewFilter,
    rows: &[ArtworkRecord],
) -> Option<EmptyReason> {
    if !rows.is_empty() || filter.is_unfiltered() {
        return None;
    }

    let artist_matches = filter
        .artist
        .as_ref()
        .map_or(true, |a| snapshot.records().iter().any(|r| r.painter == *a));
    let museum_matches = filter
        .museum
        .as_ref()
        .map_or(true, |m| snapshot.records().iter().any(|r| r.museum == *m));

    if artist_matches && museum_matches {
        Some(EmptyReason::EmptyIntersection)
    } else {
        Some(EmptyReason::FilterUnmatched)
    }
}

/// Group coordinate-bearing rows by museum co-location and rank the result.
fn aggregate_markers(rows: &[ArtworkRecord]) -> Vec<MuseumMarker> {
    // Key on the full location identity: name plus place plus coordinates.
    type Key = (String, String, String, u64, u64);
    let mut groups: HashMap<Key, MuseumMarker> = HashMap::new();

    for row in rows {
        let Some((lat, lon)) = row.coordinates() else {
            continue;
        };
        let key = (
            row.museum.clone(),
            row.city.clone(),
            row.country.clone(),
            lat.to_bits(),
            lon.to_bits(),
        );
        let marker = groups.entry(key).or_insert_with(|| MuseumMarker {
            museum: row.museum.clone(),
            city: row.city.clone(),
            country: row.country.clone(),
            latitude: lat,
            longitude: lon,
            painting_count: 0,
            paintings: Vec::new(),
        });
        marker.painting_count += 1;
        marker.paintings.push(row.painting.clone());
    }

    let mut markers: Vec<MuseumMarker> = groups.into_values().collect();
    markers.sort_by(|a, b| {
        b.painting_count
            .cmp(&a.painting_count)
            .then_with(|| a.museum.cmp(&b.museum))
            .then_with(|| a.city.cmp(&b.city))
            .then_with(|| a.latitude.total_cmp(&b.latitude))
            .then_with(|| a.longitude.total_cmp(&b.longitude))
    });
    markers
}

fn distinct<'a>(rows: &'a [ArtworkRecord], key: impl Fn(&'a ArtworkRecord) -> &'a str) -> usize {
    rows.iter().map(key).collect::<BTreeSet<_>>().len()
}

// ============================================================================
// Tests
// ============================================================================
