//! The derived-view pipeline: coercion, filtering, stable sorting and
//! pagination over an immutable [`Table`], driven by a small [`ViewState`].
//! Everything in here is pure and index-based; the model layer decides which
//! stages to re-run, the ui layer only renders the result.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveTime};

use crate::table::{Table, Value};

/// Comparison key a cell coerces to. The order is total: all numbers sort
/// before all text, numbers compare via `total_cmp`, text via byte order of
/// its lower-cased form. Values of different original types can coerce
/// equal ("5" and 5 do) -- that is intended behavior, not something callers
/// should paper over.
#[derive(Debug, Clone)]
pub enum SortKey {
    Number(f64),
    Text(String),
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

/// Coerces a cell to its comparison key. Total over every input:
/// null reads as empty text, `YYYY-MM-DD` strings as their epoch
/// milliseconds, fully-numeric strings as the number they spell, and
/// everything else as lower-cased text.
pub fn sort_key(value: &Value) -> SortKey {
    match value {
        Value::Null => SortKey::Text(String::new()),
        Value::Number(n) => SortKey::Number(*n),
        Value::Str(s) => {
            if let Some(millis) = iso_date_millis(s) {
                return SortKey::Number(millis as f64);
            }
            let trimmed = s.trim();
            if !trimmed.is_empty()
                && let Ok(n) = trimmed.parse::<f64>()
                && !n.is_nan()
            {
                return SortKey::Number(n);
            }
            SortKey::Text(s.to_lowercase())
        }
    }
}

/// Epoch milliseconds of a string shaped exactly `YYYY-MM-DD`, at midnight
/// UTC. Pattern-shaped strings that are not real calendar dates return
/// `None` and fall through to the other coercion rules.
fn iso_date_millis(s: &str) -> Option<i64> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    if !bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit())
    {
        return None;
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
}

/// How cells become comparison keys. `Rich` is the full rule set above;
/// `Plain` compares everything as lower-cased text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coercion {
    #[default]
    Rich,
    Plain,
}

impl Coercion {
    pub fn key(&self, value: &Value) -> SortKey {
        match self {
            Coercion::Rich => sort_key(value),
            Coercion::Plain => SortKey::Text(value.to_string().to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub key: String,
    pub direction: SortDirection,
}

/// Rows whose filter-column cell contains the query, case-insensitively,
/// as indices into `table` in their original order. An empty query or an
/// empty column name keeps every row; a column the dataset does not have
/// reads as empty cells, so it matches nothing once the query is non-empty.
pub fn filter_rows(table: &Table, column: &str, query: &str) -> Vec<usize> {
    if query.is_empty() || column.is_empty() {
        return (0..table.len()).collect();
    }
    let needle = query.to_lowercase();
    match table.column_index(column) {
        Some(col) => (0..table.len())
            .filter(|&row| {
                table
                    .value(row, col)
                    .to_string()
                    .to_lowercase()
                    .contains(&needle)
            })
            .collect(),
        None => Vec::new(),
    }
}

/// Reorders `rows` by the coerced key of the sort column. With no sort
/// selected this is the identity: the filtered order stays the dataset's
/// natural order.
/// The sort is stable in both directions, so rows with equal keys keep
/// their relative input order.
pub fn sort_rows(
    table: &Table,
    rows: Vec<usize>,
    sort: Option<&Sort>,
    coercion: Coercion,
) -> Vec<usize> {
    let Some(sort) = sort else {
        return rows;
    };
    let Some(col) = table.column_index(&sort.key) else {
        // Every cell of an unknown column coerces to the same key, and a
        // stable sort of all-equal keys is the identity.
        return rows;
    };

    let mut keyed: Vec<(usize, SortKey)> = rows
        .into_iter()
        .map(|row| (row, coercion.key(table.value(row, col))))
        .collect();
    match sort.direction {
        SortDirection::Ascending => keyed.sort_by(|(_, a), (_, b)| a.cmp(b)),
        SortDirection::Descending => keyed.sort_by(|(_, a), (_, b)| b.cmp(a)),
    }
    keyed.into_iter().map(|(row, _)| row).collect()
}

/// The page slice bounds plus pagination metadata for `len` ordered rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub start: usize,
    pub end: usize,
    pub current_page: usize,
    pub total_pages: usize,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            start: 0,
            end: 0,
            current_page: 1,
            total_pages: 1,
        }
    }
}

/// Clamps `page` into `[1, total_pages]` and computes the visible slice.
/// An empty row set still has one (empty) page; out-of-range requests are
/// clamped, never rejected.
pub fn paginate(len: usize, page: usize, page_size: usize) -> Page {
    let page_size = page_size.max(1);
    let total_pages = std::cmp::max(1, len.div_ceil(page_size));
    let current_page = page.clamp(1, total_pages);
    let start = std::cmp::min((current_page - 1) * page_size, len);
    let end = std::cmp::min(start + page_size, len);
    Page {
        start,
        end,
        current_page,
        total_pages,
    }
}

/// The interactive facets driving the derived view. Mutated only through
/// the transition methods below; the pipeline treats it as read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub filter_column: String,
    pub search_query: String,
    pub sort: Option<Sort>,
    pub current_page: usize,
}

impl ViewState {
    /// Defaults for a freshly loaded table: the second column is the filter
    /// column (the first if there is only one, empty if there are none),
    /// no query, no sort, page 1. A preferred column is honored when the
    /// table actually has it.
    pub fn for_table(table: &Table, filter_column: Option<&str>) -> Self {
        let columns = table.columns();
        let filter_column = filter_column
            .filter(|wanted| columns.iter().any(|c| c == wanted))
            .or_else(|| columns.get(1).or_else(|| columns.first()).map(String::as_str))
            .unwrap_or_default()
            .to_string();
        ViewState {
            filter_column,
            search_query: String::new(),
            sort: None,
            current_page: 1,
        }
    }

    /// Sort-facet transition for "activate column": ascending on that column
    /// from any state except already-ascending-on-it, which flips to
    /// descending. There is deliberately no way back to the unsorted state.
    /// The current page is kept -- search and filter changes reset it, sort
    /// changes do not.
    pub fn activate_column(&mut self, column: &str) {
        let direction = match &self.sort {
            Some(sort) if sort.key == column && sort.direction == SortDirection::Ascending => {
                SortDirection::Descending
            }
            _ => SortDirection::Ascending,
        };
        self.sort = Some(Sort {
            key: column.to_string(),
            direction,
        });
    }

    /// A changed query lands on page 1 so a shrinking match set cannot
    /// leave the view on a page past the end.
    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.current_page = 1;
    }

    pub fn set_filter_column(&mut self, column: impl Into<String>) {
        self.filter_column = column.into();
        self.current_page = 1;
    }

    /// No-op on the first page rather than an error.
    pub fn prev_page(&mut self) {
        self.current_page = self.current_page.saturating_sub(1).max(1);
    }

    /// No-op on the last page rather than an error.
    pub fn next_page(&mut self, total_pages: usize) {
        self.current_page = std::cmp::min(self.current_page + 1, total_pages.max(1));
    }

    pub fn jump_to_page(&mut self, page: usize, total_pages: usize) {
        self.current_page = page.clamp(1, total_pages.max(1));
    }
}

/// What one recomputation of the pipeline hands the renderer: the visible
/// slice (as indices into the table), the pagination metadata and the sort
/// facet for the header indicators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub columns: Vec<String>,
    pub rows: Vec<usize>,
    pub total_matching: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub sort: Option<Sort>,
}

impl ViewModel {
    pub fn sort_indicator(&self, column: &str) -> Option<SortDirection> {
        self.sort
            .as_ref()
            .filter(|sort| sort.key == column)
            .map(|sort| sort.direction)
    }
}

/// Runs the whole pipeline in one call: filter, stable sort, paginate.
/// The model keeps per-stage caches instead of calling this on every
/// keystroke, but both paths go through the same stage functions.
pub fn apply(table: &Table, state: &ViewState, page_size: usize, coercion: Coercion) -> ViewModel {
    let filtered = filter_rows(table, &state.filter_column, &state.search_query);
    let total_matching = filtered.len();
    let sorted = sort_rows(table, filtered, state.sort.as_ref(), coercion);
    let page = paginate(total_matching, state.current_page, page_size);
    ViewModel {
        columns: table.columns().to_vec(),
        rows: sorted[page.start..page.end].to_vec(),
        total_matching,
        current_page: page.current_page,
        total_pages: page.total_pages,
        sort: state.sort.clone(),
    }
}
