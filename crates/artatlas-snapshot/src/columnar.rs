//! Columnar on-disk format.
//!
//! Layout: 4-byte magic, 1-byte format version, then a bincode-encoded
//! struct-of-arrays envelope. Columns are stored by name so `decode` can
//! check that every required column is present before trusting the file;
//! unknown extra columns are ignored.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ArtworkRecord, Snapshot, SnapshotError};

const MAGIC: [u8; 4] = *b"ATSN";
const FORMAT_VERSION: u8 = 1;

/// Column names required at load, in storage order.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "painter", "painting", "museum", "city", "country", "lat", "lon",
];

#[derive(Serialize, Deserialize)]
struct Envelope {
    fetched_at: Option<i64>,
    columns: Vec<NamedColumn>,
}

#[derive(Serialize, Deserialize)]
struct NamedColumn {
    name: String,
    data: ColumnData,
}

#[derive(Serialize, Deserialize)]
enum ColumnData {
    Utf8(Vec<String>),
    F64Opt(Vec<Option<f64>>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Utf8(v) => v.len(),
            ColumnData::F64Opt(v) => v.len(),
        }
    }
}

fn utf8_column(name: &str, values: Vec<String>) -> NamedColumn {
    NamedColumn {
        name: name.to_string(),
        data: ColumnData::Utf8(values),
    }
}

fn f64_column(name: &str, values: Vec<Option<f64>>) -> NamedColumn {
    NamedColumn {
        name: name.to_string(),
        data: ColumnData::F64Opt(values),
    }
}

pub(crate) fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, SnapshotError> {
    let records = snapshot.records();
    let envelope = Envelope {
        fetched_at: snapshot.fetched_at(),
        columns: vec![
            utf8_column("painter", records.iter().map(|r| r.painter.clone()).collect()),
            utf8_column("painting", records.iter().map(|r| r.painting.clone()).collect()),
            utf8_column("museum", records.iter().map(|r| r.museum.clone()).collect()),
            utf8_column("city", records.iter().map(|r| r.city.clone()).collect()),
            utf8_column("country", records.iter().map(|r| r.country.clone()).collect()),
            f64_column("lat", records.iter().map(|r| r.latitude).collect()),
            f64_column("lon", records.iter().map(|r| r.longitude).collect()),
        ],
    };

    let body = bincode::serialize(&envelope).map_err(|e| SnapshotError::Encode(e.to_string()))?;

    let mut out = Vec::with_capacity(MAGIC.len() + 1 + body.len());
    out.extend_from_slice(&MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

pub(crate) fn decode(bytes: &[u8], path: &Path) -> Result<Snapshot, SnapshotError> {
    let corrupt = |reason: String| SnapshotError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < MAGIC.len() + 1 || bytes[..MAGIC.len()] != MAGIC {
        return Err(corrupt("not an artatlas snapshot (bad magic)".to_string()));
    }
    let version = bytes[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {version}")));
    }

    let envelope: Envelope = bincode::deserialize(&bytes[MAGIC.len() + 1..])
        .map_err(|e| corrupt(format!("undecodable body: {e}")))?;

    let by_name: HashMap<&str, &ColumnData> = envelope
        .columns
        .iter()
        .map(|c| (c.name.as_str(), &c.data))
        .collect();

    let text = |name: &str| -> Result<&Vec<String>, SnapshotError> {
        match by_name.get(name) {
            Some(ColumnData::Utf8(v)) => Ok(v),
            Some(_) => Err(corrupt(format!("column `{name}` has the wrong type"))),
            None => Err(corrupt(format!("missing required column `{name}`"))),
        }
    };
    let floats = |name: &str| -> Result<&Vec<Option<f64>>, SnapshotError> {
        match by_name.get(name) {
            Some(ColumnData::F64Opt(v)) => Ok(v),
            Some(_) => Err(corrupt(format!("column `{name}` has the wrong type"))),
            None => Err(corrupt(format!("missing required column `{name}`"))),
        }
    };

    let painter = text("painter")?;
    let painting = text("painting")?;
    let museum = text("museum")?;
    let city = text("city")?;
    let country = text("country")?;
    let lat = floats("lat")?;
    let lon = floats("lon")?;

    let rows = painter.len();
    for name in REQUIRED_COLUMNS {
        let len = by_name[name].len();
        if len != rows {
            return Err(corrupt(format!(
                "column `{name}` has {len} rows, expected {rows}"
            )));
        }
    }

    let mut records = Vec::with_capacity(rows);
    for i in 0..rows {
        if lat[i].is_some() != lon[i].is_some() {
            return Err(corrupt(format!("row {i} has one-sided coordinates")));
        }
        records.push(ArtworkRecord {
            painter: painter[i].clone(),
            painting: painting[i].clone(),
            museum: museum[i].clone(),
            city: city[i].clone(),
            country: country[i].clone(),
            latitude: lat[i],
            longitude: lon[i],
        });
    }

    Ok(Snapshot::new(records, envelope.fetched_at))
}
