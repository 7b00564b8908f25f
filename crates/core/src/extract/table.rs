//! Search and pagination over extracted table rows.

use serde::Serialize;

use crate::extract::rows::Row;

/// Rows shown per table page.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Keep rows where any cell's display text contains `query`,
/// case-insensitively. A blank query keeps everything.
pub fn filter_rows(rows: &[Row], query: &str) -> Vec<Row> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|row| {
            row.cells
                .iter()
                .any(|cell| cell.display.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// One page of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub rows: Vec<Row>,
    /// 1-based page number actually shown after clamping.
    pub page: usize,
    /// Never less than 1, even for an empty table.
    pub total_pages: usize,
    pub total_rows: usize,
}

/// Slice out page `page` (1-based). Out-of-range pages clamp to the nearest
/// valid one; a zero `page_size` is treated as [`DEFAULT_PAGE_SIZE`].
pub fn paginate(rows: &[Row], page: usize, page_size: usize) -> Page {
    let page_size = if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    };
    let total_pages = rows.len().div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(rows.len());

    Page {
        rows: rows[start..end].to_vec(),
        page,
        total_pages,
        total_rows: rows.len(),
    }
}
