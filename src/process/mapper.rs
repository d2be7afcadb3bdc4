use crate::{
    error::{IngestError, IngestResult},
    process::{raw_table::RawTable, RecordSet, Value},
    source::Mapping,
};
use std::path::Path;
use tracing::debug;

fn cell(raw: Option<String>) -> Value {
    match raw {
        Some(s) if !s.is_empty() => Value::Text(s),
        _ => Value::Null,
    }
}

/// Label physical columns with `names` by position.
///
/// The column count is not checked: field `j` of every row is labeled
/// `names[j]`, extra physical fields are dropped and missing ones read as
/// null. A wrong name list therefore yields mislabeled data, not an error.
pub fn relabel(raw: RawTable, names: &[&str]) -> RecordSet {
    let mut out = RecordSet::new(names.iter().map(|n| n.to_string()).collect());
    out.rows = raw
        .rows
        .into_iter()
        .map(|row| {
            let mut fields = row.into_iter();
            (0..names.len()).map(|_| cell(fields.next())).collect()
        })
        .collect();
    out
}

/// Pick columns by header name, in the order of `pairs` (canonical, header).
pub fn select_by_header(
    raw: RawTable,
    pairs: &[(&str, &str)],
    path: &Path,
) -> IngestResult<RecordSet> {
    let indices = pairs
        .iter()
        .map(|(_, header)| {
            raw.headers
                .iter()
                .position(|h| h.trim() == *header)
                .ok_or_else(|| IngestError::FileLoad {
                    path: path.to_path_buf(),
                    reason: format!("missing header `{}`", header),
                })
        })
        .collect::<IngestResult<Vec<_>>>()?;

    let mut out = RecordSet::new(pairs.iter().map(|(name, _)| name.to_string()).collect());
    out.rows = raw
        .rows
        .into_iter()
        .map(|row| indices.iter().map(|&i| cell(row.get(i).cloned())).collect())
        .collect();
    Ok(out)
}

/// Turn a raw table into a record set according to a descriptor's mapping.
pub fn apply_mapping(raw: RawTable, mapping: &Mapping<'_>, path: &Path) -> IngestResult<RecordSet> {
    let width = raw.width();
    let set = match mapping {
        Mapping::Positional(names) => relabel(raw, names),
        Mapping::ByHeader(pairs) => select_by_header(raw, pairs, path)?,
    };
    debug!(
        physical = width,
        canonical = set.columns.len(),
        rows = set.len(),
        "renamed columns"
    );
    Ok(set)
}
