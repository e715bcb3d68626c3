//! Offset-based pagination parameters for list endpoints.

use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Page/limit query parameters, clamped to sane bounds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageParams {
    /// Page clamped to >= 1.
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    /// Limit clamped to 1..=MAX_LIMIT.
    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LIMIT)
    }

    /// Row offset for SQL queries.
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_values() {
        let params = PageParams { page: 0, limit: 0 };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 1);
        assert_eq!(params.offset(), 0);

        let params = PageParams {
            page: 3,
            limit: 1000,
        };
        assert_eq!(params.limit(), MAX_LIMIT);
        assert_eq!(params.offset(), 2 * MAX_LIMIT);
    }
}
