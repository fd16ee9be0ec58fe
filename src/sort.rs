//! Default record ordering applied by the data source before reshaping.

use crate::csv_encoder::is_numeric;
use crate::error::{ReportError, ReportResult};
use crate::metadata::ProjectMetadata;
use crate::types::{NormalizedReportData, RawValue, RecordData, SortKey};
use log::warn;
use std::cmp::Ordering;

/// Sort records by the given keys. Values compare numerically when both sides are numeric.
pub fn sort_records(
    data: NormalizedReportData,
    keys: &[SortKey],
    project: &ProjectMetadata,
) -> ReportResult<NormalizedReportData> {
    if keys.is_empty() {
        return Ok(data);
    }
    for key in keys {
        if key.field != project.table_pk && project.field(&key.field).is_none() {
            return Err(ReportError::SortFailure(format!("unknown sort field '{}'", key.field)));
        }
    }

    let mut records: Vec<(String, RecordData)> = data.records.into_iter().collect();
    records.sort_by(|(id_a, a), (id_b, b)| {
        keys.iter()
            .map(|key| {
                let va = sort_value(id_a, a, &key.field, project);
                let vb = sort_value(id_b, b, &key.field, project);
                let ord = compare_values(&va, &vb);
                if key.ascending { ord } else { ord.reverse() }
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    Ok(NormalizedReportData { records: records.into_iter().collect() })
}

/// Sort, or keep the original order when sorting fails
pub fn sort_or_original(data: NormalizedReportData, keys: &[SortKey], project: &ProjectMetadata) -> NormalizedReportData {
    match sort_records(data.clone(), keys, project) {
        Ok(sorted) => sorted,
        Err(e) => {
            warn!("{}; keeping original record order", e);
            data
        }
    }
}

// First non-repeating value of the field across the record's events
fn sort_value(record_id: &str, record: &RecordData, field: &str, project: &ProjectMetadata) -> String {
    if field == project.table_pk {
        return record_id.to_string();
    }
    record
        .events
        .values()
        .find_map(|fields| match fields.get(field) {
            Some(RawValue::Text(s)) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Blank values first, then numbers by value, then text
pub fn compare_values(a: &str, b: &str) -> Ordering {
    fn rank(v: &str) -> u8 {
        if v.trim().is_empty() {
            0
        } else if is_numeric(v) {
            1
        } else {
            2
        }
    }
    match (rank(a), rank(b)) {
        (1, 1) => {
            let fa = a.trim().parse::<f64>().unwrap_or(0.0);
            let fb = b.trim().parse::<f64>().unwrap_or(0.0);
            fa.total_cmp(&fb)
        }
        (ra, rb) if ra == rb => a.cmp(b),
        (ra, rb) => ra.cmp(&rb),
    }
}
