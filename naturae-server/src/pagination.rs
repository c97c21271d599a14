//! Page arithmetic for the public deck browser

use serde::Serialize;

/// Decks shown per browser page
pub const PAGE_SIZE: i64 = 24;

/// Where a requested page lands within the public deck listing
///
/// Serializes into the page fields of the listing response; the SQL offset
/// stays server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Total number of pages; zero when nothing matched
    pub total_pages: i64,
    /// Number of matching decks across all pages
    pub total: i64,
    pub page_size: i64,
    /// Offset for the LIMIT/OFFSET query
    #[serde(skip)]
    pub offset: i64,
}

/// Work out the page to show for a deck search
///
/// # Arguments
/// * `total_decks` - Number of public decks matching the search
/// * `requested_page` - `page` query parameter (may be zero, negative or past the end)
///
/// # Returns
/// Page metadata with the page clamped to `[1, total_pages]` (page 1 for an
/// empty result) and the matching query offset
///
/// # Examples
/// ```
/// use naturae_server::pagination::calculate_pagination;
///
/// // 60 decks = 3 pages (24 + 24 + 12)
/// let p = calculate_pagination(60, 2);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 24);
///
/// // Past the last page shows the last page
/// let p = calculate_pagination(60, 99);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 48);
/// ```
pub fn calculate_pagination(total_decks: i64, requested_page: i64) -> Pagination {
    let total_decks = total_decks.max(0);
    let total_pages = (total_decks + PAGE_SIZE - 1) / PAGE_SIZE;
    let page = requested_page.max(1).min(total_pages.max(1));

    Pagination {
        page,
        total_pages,
        total: total_decks,
        page_size: PAGE_SIZE,
        offset: (page - 1) * PAGE_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(60, 2);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 24);
        assert_eq!(p.total, 60);
    }

    #[test]
    fn test_pagination_negative_page() {
        let p = calculate_pagination(30, -4);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 2);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_no_decks() {
        let p = calculate_pagination(0, 3);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_serializes_without_offset() {
        let json = serde_json::to_value(calculate_pagination(25, 2)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "page": 2, "total_pages": 2, "total": 25, "page_size": 24 })
        );
    }
}
