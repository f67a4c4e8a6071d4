//! Cursor pagination over `id DESC`.
//!
//! A token is the decimal `id` of the last row of the previous page. The next
//! page contains only rows with a strictly smaller `id`, so the boundary row is
//! never repeated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ValidationError;
use super::Liker;

/// Exclusive upper bound on `id` for the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(u64);

impl PageToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }

    /// Parse an optional wire token. Absent is fine; present-but-empty or
    /// non-numeric is a caller error.
    pub fn parse_optional(raw: Option<&str>) -> Result<Option<Self>, ValidationError> {
        raw.map(str::parse).transpose()
    }
}

impl FromStr for PageToken {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::EmptyPaginationToken);
        }
        // `u64::from_str` takes a leading `+`; tokens are bare digits only.
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidPaginationToken(format!(
                "invalid digit in {s:?}"
            )));
        }
        s.parse::<u64>()
            .map(PageToken)
            .map_err(|e| ValidationError::InvalidPaginationToken(e.to_string()))
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum number of rows in one page.
pub type PageLimit = u32;

/// Bounds for one read. `None` on either side means "unbounded".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<PageToken>,
    pub limit: Option<PageLimit>,
}

impl PageRequest {
    pub fn new(cursor: Option<PageToken>, limit: Option<PageLimit>) -> Self {
        Self { cursor, limit }
    }

    /// No cursor, no limit: the whole result set from the newest row down.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn first(limit: PageLimit) -> Self {
        Self::new(None, Some(limit))
    }

    /// Whether a row with this `id` falls inside the cursor bound.
    pub fn admits(&self, id: u64) -> bool {
        self.cursor.is_none_or(|cursor| id < cursor.id())
    }

    /// Token for the page after `page`.
    ///
    /// Only limited requests continue; an unlimited request already returned
    /// everything. An empty page ends the stream.
    pub fn next_token(&self, page: &[Liker]) -> Option<PageToken> {
        self.limit?;
        page.last().map(|liker| PageToken(liker.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn liker(id: u64) -> Liker {
        Liker {
            id,
            actor_id: format!("user-{id}").into(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn absent_token_is_none() {
        assert_eq!(PageToken::parse_optional(None), Ok(None));
    }

    #[test]
    fn numeric_token_parses() {
        assert_eq!(
            PageToken::parse_optional(Some("11")),
            Ok(Some(PageToken::new(11)))
        );
    }

    #[rstest]
    #[case::empty("")]
    #[case::alpha("a")]
    #[case::negative("-1")]
    #[case::overflow("18446744073709551616")]
    #[case::padded(" 5")]
    #[case::plus_signed("+5")]
    fn bad_tokens_are_rejected(#[case] raw: &str) {
        assert!(PageToken::parse_optional(Some(raw)).is_err());
    }

    #[test]
    fn plus_signed_token_is_invalid_not_empty() {
        assert!(matches!(
            "+11".parse::<PageToken>(),
            Err(ValidationError::InvalidPaginationToken(_))
        ));
    }

    #[test]
    fn empty_token_has_its_own_error() {
        assert_eq!(
            PageToken::parse_optional(Some("")),
            Err(ValidationError::EmptyPaginationToken)
        );
    }

    #[test]
    fn token_displays_as_decimal() {
        assert_eq!(PageToken::new(12).to_string(), "12");
    }

    #[test]
    fn cursor_bound_is_exclusive() {
        let req = PageRequest::new(Some(PageToken::new(11)), None);
        assert!(req.admits(10));
        assert!(!req.admits(11));
        assert!(!req.admits(12));
        assert!(PageRequest::unbounded().admits(u64::MAX));
    }

    #[test]
    fn next_token_uses_last_row_of_limited_page() {
        let req = PageRequest::first(2);
        let page = vec![liker(12), liker(11)];
        assert_eq!(req.next_token(&page), Some(PageToken::new(11)));
    }

    #[test]
    fn no_next_token_without_limit_or_rows() {
        let page = vec![liker(12), liker(11)];
        assert_eq!(PageRequest::unbounded().next_token(&page), None);
        assert_eq!(PageRequest::first(2).next_token(&[]), None);
    }
}
