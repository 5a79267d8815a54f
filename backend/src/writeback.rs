//! Save path: edited or uploaded tables back to their sheet.
//!
//! A save replaces the whole sheet. There is no merge or conflict check, the
//! last writer wins. Callers drop the cached load afterwards.

use crate::api::logs::{log_info, log_success};
use crate::error::SourceResult;
use crate::models::{Cell, RawTable};
use crate::normalize::{format_date, normalize_headers};
use crate::source::SheetSource;

/// Copy of `table` in the shape the sheet stores: canonical headers and
/// dates as `DD/MM/YYYY` text.
pub fn prepare_for_save(table: &RawTable) -> RawTable {
    let mut prepared = table.clone();
    normalize_headers(&mut prepared);
    for cell in prepared.rows.iter_mut().flatten() {
        if let Cell::Date(date) = cell {
            *cell = Cell::Text(format_date(*date));
        }
    }
    prepared
}

/// Write `table` over `sheet`.
pub async fn save_table(source: &dyn SheetSource, sheet: &str, table: &RawTable) -> SourceResult<RawTable> {
    let prepared = prepare_for_save(table);
    log_info(format!(
        "💾 Saving {} rows to '{}' in '{}'...",
        prepared.len(),
        sheet,
        source.workbook()
    ));
    source.write_sheet(sheet, &prepared).await?;
    log_success(format!("'{}' saved", sheet));
    Ok(prepared)
}
