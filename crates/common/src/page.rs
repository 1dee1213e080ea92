use serde::Serialize;
use thiserror::Error;

/// A pagination parameter was negative.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {parameter} parameter: {value} (must not be negative)")]
pub struct InvalidRange {
    pub parameter: &'static str,
    pub value: i64,
}

/// A `(skip, limit)` window over an ordered listing.
///
/// `limit == None` means every remaining row after `skip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Page {
    pub skip: u64,
    pub limit: Option<u64>,
}

impl Page {
    /// The whole listing.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a window from raw request parameters.
    ///
    /// Absent or zero `limit` selects everything after `skip`. Negative values
    /// of either parameter are rejected.
    pub fn from_params(skip: Option<i64>, limit: Option<i64>) -> Result<Self, InvalidRange> {
        Self::from_named_params(("skip", skip), ("limit", limit))
    }

    /// Same as [`Page::from_params`] but reports errors under custom parameter
    /// names, e.g. `product_skip` for nested listings.
    pub fn from_named_params(
        skip: (&'static str, Option<i64>),
        limit: (&'static str, Option<i64>),
    ) -> Result<Self, InvalidRange> {
        let skip_value = non_negative(skip.0, skip.1.unwrap_or(0))?;
        let limit_value = non_negative(limit.0, limit.1.unwrap_or(0))?;

        Ok(Self {
            skip: skip_value,
            limit: (limit_value > 0).then_some(limit_value),
        })
    }

    pub fn new(skip: u64, limit: Option<u64>) -> Self {
        Self {
            skip,
            limit: limit.filter(|l| *l > 0),
        }
    }

    /// Applies the window to an already ordered slice.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let iter = items.iter().skip(skip).cloned();
        match self.limit {
            Some(limit) => iter
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => iter.collect(),
        }
    }
}

fn non_negative(parameter: &'static str, value: i64) -> Result<u64, InvalidRange> {
    u64::try_from(value).map_err(|_| InvalidRange { parameter, value })
}

/// One window of a listing plus the size of the unpaginated result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, page: Page) -> Self {
        Self {
            items,
            total,
            skip: page.skip,
            limit: page.limit,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            skip: self.skip,
            limit: self.limit,
        }
    }
}
