//! Pagination settings and the envelope wrapping find results.

use serde::{Deserialize, Serialize};

/// Limit used when neither the request nor the settings name one.
pub const DEFAULT_LIMIT: usize = 100;

/// A page of find results.
///
/// `total` is the number of documents matching the query before `skip` and `limit` are
/// applied; `data` holds at most `limit` of them.
///
/// # Example
///
/// ```ignore
/// use revlayer::page::Paginated;
///
/// let page = Paginated::builder(vec!["a", "b"])
///     .with_total(5)
///     .with_limit(2)
///     .build();
///
/// assert_eq!(page.data.len(), 2);
/// assert_eq!(page.total, 5);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub total: usize,
    pub limit: usize,
    pub skip: usize,
    pub data: Vec<T>,
}

impl<T> Paginated<T> {
    /// Creates a new builder for constructing a page.
    pub fn builder(data: Vec<T>) -> PaginatedBuilder<T> {
        PaginatedBuilder::new(data)
    }
}

impl<T> Default for Paginated<T> {
    fn default() -> Self {
        Self {
            total: 0,
            limit: DEFAULT_LIMIT,
            skip: 0,
            data: Vec::new(),
        }
    }
}

/// Builder for constructing [`Paginated`] instances.
pub struct PaginatedBuilder<T> {
    data: Vec<T>,
    total: Option<usize>,
    limit: usize,
    skip: usize,
}

impl<T> PaginatedBuilder<T> {
    /// Creates a new builder with the given items.
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            total: None,
            limit: DEFAULT_LIMIT,
            skip: 0,
        }
    }

    /// Sets the total number of matching items. Defaults to the number of items.
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }

    /// Sets the limit the page was requested with.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the number of skipped items.
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Builds and returns the final [`Paginated`] instance.
    pub fn build(self) -> Paginated<T> {
        Paginated {
            total: self.total.unwrap_or(self.data.len()),
            limit: self.limit,
            skip: self.skip,
            data: self.data,
        }
    }
}

/// Pagination settings of a service.
///
/// Both values are optional; with nothing configured a find returns up to
/// [`DEFAULT_LIMIT`] documents and callers may ask for any limit.
///
/// ```ignore
/// use revlayer::page::Paginate;
///
/// let paginate: Paginate = serde_json::from_str(r#"{ "default": 5, "max": 15 }"#)?;
/// assert_eq!(paginate.limit(None), 5);
/// assert_eq!(paginate.limit(Some(50)), 15);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Paginate {
    /// Limit applied when the request names none.
    #[serde(default)]
    pub default: Option<usize>,
    /// Upper bound for any requested limit.
    #[serde(default)]
    pub max: Option<usize>,
}

impl Paginate {
    /// Creates pagination settings.
    pub fn new(default: Option<usize>, max: Option<usize>) -> Self {
        Self { default, max }
    }

    /// Resolves the effective limit for a request.
    pub fn limit(&self, requested: Option<usize>) -> usize {
        let limit = requested
            .or(self.default)
            .unwrap_or(DEFAULT_LIMIT);

        match self.max {
            Some(max) => limit.min(max),
            None => limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_prefers_request_then_default() {
        assert_eq!(Paginate::default().limit(None), DEFAULT_LIMIT);
        assert_eq!(Paginate::default().limit(Some(7)), 7);
        assert_eq!(Paginate::new(Some(2), None).limit(None), 2);
        assert_eq!(Paginate::new(Some(2), None).limit(Some(3)), 3);
    }

    #[test]
    fn limit_is_capped_by_max() {
        let paginate = Paginate::new(Some(2), Some(4));

        assert_eq!(paginate.limit(Some(10)), 4);
        assert_eq!(paginate.limit(Some(4)), 4);
        assert_eq!(Paginate::new(None, Some(15)).limit(None), 15);
    }

    #[test]
    fn total_defaults_to_item_count() {
        let page = Paginated::builder(vec![1, 2, 3]).with_limit(3).with_skip(6).build();

        assert_eq!(page, Paginated { total: 3, limit: 3, skip: 6, data: vec![1, 2, 3] });
    }
}
