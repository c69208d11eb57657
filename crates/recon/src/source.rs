use log::warn;
use registrar_core::{AttrBag, EntityKind};

use crate::config::ColumnMapping;
use crate::error::ReconError;
use crate::model::IncomingRecord;

/// Build incoming records from already-parsed CSV text.
///
/// This is the validated construction boundary: attribute columns must map
/// to keys the entity kind recognizes, and rows without a usable name are
/// filtered out here; the engine assumes every record it sees has one.
/// The ordinal is the source row position, so labels stay stable even when
/// rows are filtered.
pub fn records_from_csv(
    csv_data: &str,
    columns: &ColumnMapping,
    kind: EntityKind,
) -> Result<Vec<IncomingRecord>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let idx = |name: &str| -> Result<usize, ReconError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ReconError::MissingColumn { column: name.into() })
    };

    let name_idx = idx(&columns.name)?;
    let external_id_idx = match &columns.external_id {
        Some(column) => Some(idx(column)?),
        None => None,
    };

    let mut attr_indices: Vec<(usize, &str)> = Vec::new();
    for (column, key) in &columns.attrs {
        if !kind.recognizes(key) {
            return Err(ReconError::UnrecognizedAttribute {
                column: column.clone(),
                kind,
            });
        }
        attr_indices.push((idx(column)?, key.as_str()));
    }

    let mut records = Vec::new();

    for (ordinal, row) in reader.records().enumerate() {
        let row = row.map_err(|e| ReconError::Io(e.to_string()))?;

        let name = row.get(name_idx).unwrap_or("").trim();
        if name.is_empty() {
            warn!("row {}: empty name, filtered out", ordinal + 1);
            continue;
        }

        let mut record = IncomingRecord::new(ordinal, name);

        if let Some(ei) = external_id_idx {
            let value = row.get(ei).unwrap_or("").trim();
            if !value.is_empty() {
                record.external_id = Some(value.to_string());
            }
        }

        let pairs = attr_indices.iter().filter_map(|(index, key)| {
            let value = row.get(*index).unwrap_or("").trim();
            (!value.is_empty()).then(|| (key.to_string(), value.to_string()))
        });
        record.attrs = AttrBag::validated(kind, pairs).map_err(|e| {
            ReconError::UnrecognizedAttribute {
                column: e.key,
                kind,
            }
        })?;

        records.push(record);
    }

    Ok(records)
}
