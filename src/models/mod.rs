use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub mod content;
pub mod habit;
pub mod profile;

pub use content::{insert_into_season, Content, ContentDetails, ContentInfo, ContentKind, SeasonMap};
pub use habit::{Habit, ProgressUpdate, WatchPolicy};
pub use profile::{Profile, User, MAX_PROFILES_PER_USER};

/// Parses an identifier supplied by a client.
///
/// Malformed identifiers are a client error, never a silent "not found".
pub fn parse_id(field: &str, raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::InvalidInput(format!("{} '{}' is not a valid id", field, raw)))
}

/// Parses an optional identifier, treating blank values as absent
pub fn parse_optional_id(field: &str, raw: Option<&str>) -> AppResult<Option<Uuid>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_id(field, value).map(Some),
    }
}

/// Pagination metadata returned alongside a page of results
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub has_more: bool,
    pub limit: u32,
}

impl Pagination {
    pub fn new(current_page: u32, limit: u32, total_count: u64) -> Self {
        let total_pages = total_count.div_ceil(u64::from(limit.max(1))) as u32;
        Self {
            current_page,
            total_pages,
            total_count,
            has_more: current_page < total_pages,
            limit,
        }
    }

    /// Number of rows preceding the page
    pub fn offset(page: u32, limit: u32) -> u64 {
        u64::from(page.saturating_sub(1)) * u64::from(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_rejects_garbage() {
        let err = parse_id("profileId", "not-an-id").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_optional_id_blank_is_none() {
        assert_eq!(parse_optional_id("showId", None).unwrap(), None);
        assert_eq!(parse_optional_id("showId", Some("  ")).unwrap(), None);
        let id = Uuid::new_v4();
        assert_eq!(
            parse_optional_id("showId", Some(&id.to_string())).unwrap(),
            Some(id)
        );
    }

    #[test]
    fn test_pagination_last_partial_page() {
        let pagination = Pagination::new(2, 10, 15);
        assert_eq!(pagination.total_pages, 2);
        assert!(!pagination.has_more);
        assert_eq!(Pagination::offset(2, 10), 10);
    }

    #[test]
    fn test_pagination_empty() {
        let pagination = Pagination::new(1, 10, 0);
        assert_eq!(pagination.total_pages, 0);
        assert!(!pagination.has_more);
    }
}
