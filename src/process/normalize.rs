use crate::process::{
    utils::{is_infinite_text, parse_number},
    RecordSet, Value,
};
use tracing::{debug, warn};

/// Null out ±infinity everywhere, then coerce `numeric_columns` to numbers.
///
/// Cells that fail to parse become null. Columns not listed keep their text
/// unless it spells infinity (`inf`, `-Infinity`, ...): such a cell is nulled
/// in every column, text columns included, whereas a pandas read keeps it as
/// a string when the column is not numeric. Running this twice gives the
/// same result as running it once.
pub fn normalize(set: &mut RecordSet, numeric_columns: &[String]) {
    let mut infinities = 0usize;
    for row in &mut set.rows {
        for v in row.iter_mut() {
            let infinite = match v {
                Value::Number(n) => n.is_infinite(),
                Value::Text(s) => is_infinite_text(s),
                Value::Null => false,
            };
            if infinite {
                *v = Value::Null;
                infinities += 1;
            }
        }
    }

    let targets: Vec<usize> = numeric_columns
        .iter()
        .filter_map(|name| {
            let idx = set.column_index(name);
            if idx.is_none() {
                warn!(column = %name, "numeric column not present in record set");
            }
            idx
        })
        .collect();

    let mut coerced_to_null = 0usize;
    for row in &mut set.rows {
        for &idx in &targets {
            let Some(v) = row.get_mut(idx) else { continue };
            if let Value::Text(s) = v {
                *v = match parse_number(s) {
                    Some(n) => Value::Number(n),
                    None => {
                        coerced_to_null += 1;
                        Value::Null
                    }
                };
            }
        }
    }

    debug!(
        numeric = targets.len(),
        infinities, coerced_to_null, "converted numeric columns"
    );
}
