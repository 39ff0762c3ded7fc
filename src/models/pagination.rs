//! Pagination query parameters for list endpoints.

use serde::Deserialize;

/// `?skip=&take=` query. Values are checked by the validation layer, so
/// signed integers are accepted here to report negatives as rule violations.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PaginationQuery {
    #[serde(default)]
    pub skip: Option<i64>,
    #[serde(default)]
    pub take: Option<i64>,
}

/// Resolved page window handed to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u32,
    pub take: u32,
}

/// Page size policy applied when a query omits or oversizes `take`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_take: u32,
    pub max_take: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_take: 20,
            max_take: 100,
        }
    }
}

impl PageLimits {
    /// Resolve a validated query into a concrete window.
    pub fn page(&self, query: &PaginationQuery) -> Page {
        // Out-of-range values saturate rather than falling back to the defaults.
        let skip = query
            .skip
            .map_or(0, |s| u32::try_from(s.max(0)).unwrap_or(u32::MAX));
        let take = match query.take {
            Some(t) if t > 0 => u32::try_from(t)
                .unwrap_or(u32::MAX)
                .min(self.max_take),
            _ => self.default_take,
        };
        Page { skip, take }
    }
}
