//! Sequential per-day ids for the live record list.

use crate::record::InspirationRecord;

/// Next id for `records`: one past the numeric maximum, zero-padded to 3.
///
/// Ids are never reused within a day, so deleting `002` from
/// `001..=003` still yields `004`. Ids that do not parse count as 0. Past
/// 999 the id simply grows wider.
pub fn next_id(records: &[InspirationRecord]) -> String {
    let max = records
        .iter()
        .map(|record| record.id.trim().parse::<u32>().unwrap_or(0))
        .max()
        .unwrap_or(0);
    format!("{:03}", max + 1)
}
