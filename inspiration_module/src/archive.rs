//! Daily rollover of the live record list into a dated archive document.
//!
//! The live list is assumed to hold a single day. Before any operation the
//! date of the *last* record is compared with today; if it is earlier, the
//! whole list is rendered under that date, stored as
//! `inspirations_<date>.md` and the live list is cleared. A list that spans
//! several stale days (the bot was down for a while) is archived in one
//! document under the newest of those days.

use chrono::{Local, NaiveDate};
use tracing::info;

use crate::record::InspirationRecord;
use crate::record_store::{RecordStore, StoreError};

/// Result of a rollover that actually happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub date: NaiveDate,
    pub file_name: String,
    pub archived: usize,
}

pub fn archive_file_name(date: NaiveDate) -> String {
    format!("inspirations_{}.md", date.format("%Y-%m-%d"))
}

/// Date of the live list, taken from its last record (UTC calendar date).
pub fn live_list_date(records: &[InspirationRecord]) -> Option<NaiveDate> {
    records.last().map(|record| record.timestamp.date_naive())
}

/// Archive and clear `user_id`'s live list if it belongs to a day before `today`.
pub async fn maybe_archive(
    store: &dyn RecordStore,
    user_id: &str,
    today: NaiveDate,
) -> Result<Option<ArchiveSummary>, StoreError> {
    let (_, summary) = rollover(store, user_id, today).await?;
    Ok(summary)
}

/// Run the rollover check and return the live list as it stands afterwards.
///
/// The archive is written before the live list is cleared, so a failed
/// archive write leaves the records in place.
pub async fn rollover(
    store: &dyn RecordStore,
    user_id: &str,
    today: NaiveDate,
) -> Result<(Vec<InspirationRecord>, Option<ArchiveSummary>), StoreError> {
    let records = store.load_records(user_id).await?;
    let Some(date) = live_list_date(&records) else {
        return Ok((records, None));
    };
    if date >= today {
        return Ok((records, None));
    }

    info!("Archiving inspirations from {} for user {}", date, user_id);
    let file_name = archive_file_name(date);
    let document = render_archive(&records, date);
    store.save_archive(user_id, &document, &file_name).await?;
    store.save_records(user_id, &[]).await?;
    info!(
        "Archived {} inspirations to {} for user {}",
        records.len(),
        file_name,
        user_id
    );

    let summary = ArchiveSummary {
        date,
        file_name,
        archived: records.len(),
    };
    Ok((Vec::new(), Some(summary)))
}

/// Markdown document with one section per record, in list order.
pub fn render_archive(records: &[InspirationRecord], date: NaiveDate) -> String {
    let mut markdown = format!("# Inspirations - {}\n\n", date.format("%Y-%m-%d"));
    for record in records {
        let tags = if record.tags.is_empty() {
            "none".to_string()
        } else {
            record
                .tags
                .iter()
                .map(|tag| format!("#{}", tag))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let time = record.timestamp.with_timezone(&Local).format("%H:%M");
        let image = if record.image.is_some() { "yes" } else { "no" };

        markdown.push_str(&format!("## #{} {}\n", record.id, record.content));
        markdown.push_str(&format!("- Tags: {}\n", tags));
        markdown.push_str(&format!("- Time: {}\n", time));
        markdown.push_str(&format!("- Image: {}\n\n", image));
    }
    markdown
}
