pub mod audit;
pub mod flags;
pub mod incidents;
pub mod jobs;
pub mod saved_views;
pub mod tenant;

pub type DbPool = sqlx::PgPool;

/// Implemented by row types that can seed the next page's `cursor` filter —
/// every list repository orders newest-first and paginates by `id <
/// cursor`, so the cursor is always the last item's id.
pub trait Cursorable {
    fn cursor(&self) -> uuid::Uuid;
}

/// Cursor-paginated result: the page, whether more rows exist beyond it,
/// and the cursor a caller passes back to fetch the next page.
///
/// Every list repository fetches `limit + 1` rows and trims the extra one
/// to decide `has_more` without a separate `COUNT(*)` query; the trimmed
/// last row's id becomes `next_cursor`.
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<uuid::Uuid>,
}

impl<T: Cursorable> Page<T> {
    pub fn from_fetched(mut items: Vec<T>, limit: usize) -> Self {
        let has_more = items.len() > limit;
        if has_more {
            items.truncate(limit);
        }
        let next_cursor = if has_more { items.last().map(Cursorable::cursor) } else { None };
        Page { items, has_more, next_cursor }
    }
}

pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, max)
}
