use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// Body of `POST /products/filter`.
///
/// Every field is optional; an empty body returns the whole catalog, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    /// Exact category. Empty or `"all"` disables the filter.
    pub category: Option<String>,
    /// Inclusive `[min, max]` price bounds
    pub price_range: Option<Vec<f64>>,
    /// `newest` (default) or `popular`
    pub sort_by: Option<String>,
    /// Case-insensitive substring matched against name and title
    pub search: Option<String>,
}

/// Validated, inclusive price bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBounds {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceBounds {
    pub fn contains(&self, price: Decimal) -> bool {
        self.min <= price && price <= self.max
    }
}

/// Ordering of a product listing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Most recently created first
    #[default]
    Newest,
    /// Highest popularity first, newest first among ties
    Popular,
}

impl FromStr for SortBy {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "newest" | "recent" | "latest" => Ok(SortBy::Newest),
            "popular" | "popularity" => Ok(SortBy::Popular),
            other => Err(FilterError::UnknownSort(other.to_string())),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortBy::Newest => f.write_str("newest"),
            SortBy::Popular => f.write_str("popular"),
        }
    }
}

/// Reasons a [`ProductFilter`] is rejected.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    #[error("priceRange must contain exactly two numbers, got {0}")]
    PriceRangeLength(usize),
    #[error("priceRange bounds must be finite, non-negative numbers")]
    InvalidPrice,
    #[error("priceRange minimum {min} is greater than maximum {max}")]
    PriceRangeOrder { min: Decimal, max: Decimal },
    #[error("unknown sortBy value '{0}', expected 'newest' or 'popular'")]
    UnknownSort(String),
}

impl FilterError {
    /// Name of the request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            FilterError::UnknownSort(_) => "sortBy",
            _ => "priceRange",
        }
    }
}

impl ProductFilter {
    /// The category to match, if the filter is active.
    pub fn category_filter(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
    }

    /// The trimmed search term, if any.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn sort(&self) -> Result<SortBy, FilterError> {
        self.sort_by
            .as_deref()
            .map_or(Ok(SortBy::default()), SortBy::from_str)
    }

    pub fn price_bounds(&self) -> Result<Option<PriceBounds>, FilterError> {
        let Some(range) = self.price_range.as_deref() else {
            return Ok(None);
        };
        let [min, max] = range else {
            return Err(FilterError::PriceRangeLength(range.len()));
        };

        let min = to_price(*min)?;
        let max = to_price(*max)?;
        if min > max {
            return Err(FilterError::PriceRangeOrder { min, max });
        }
        Ok(Some(PriceBounds { min, max }))
    }

    /// Rejects the first invalid field, without touching the database.
    pub fn validate(&self) -> Result<(), FilterError> {
        self.sort()?;
        self.price_bounds()?;
        Ok(())
    }
}

fn to_price(value: f64) -> Result<Decimal, FilterError> {
    if !value.is_finite() || value < 0.0 {
        return Err(FilterError::InvalidPrice);
    }
    // `from_f64` rounds to the shortest representation, so 19.99 stays 19.99.
    Decimal::from_f64(value).ok_or(FilterError::InvalidPrice)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_json(body: &str) -> ProductFilter {
        serde_json::from_str(body).expect("valid filter body")
    }

    #[test]
    fn test_empty_body_is_unfiltered_newest() {
        let filter = filter_json("{}");
        assert_eq!(filter.category_filter(), None);
        assert_eq!(filter.search_term(), None);
        assert_eq!(filter.price_bounds(), Ok(None));
        assert_eq!(filter.sort(), Ok(SortBy::Newest));
    }

    #[test]
    fn test_camel_case_fields() {
        let filter = filter_json(
            r#"{"category": "books", "priceRange": [10, 19.99], "sortBy": "popular", "search": " atlas "}"#,
        );
        assert_eq!(filter.category_filter(), Some("books"));
        assert_eq!(filter.search_term(), Some("atlas"));
        assert_eq!(filter.sort(), Ok(SortBy::Popular));

        let bounds = filter.price_bounds().unwrap().unwrap();
        assert_eq!(bounds.min, Decimal::new(10, 0));
        assert_eq!(bounds.max, Decimal::new(1999, 2));
        assert!(bounds.contains(Decimal::new(1999, 2)));
        assert!(!bounds.contains(Decimal::new(2000, 2)));
    }

    #[test]
    fn test_all_category_disables_filter() {
        let filter = ProductFilter {
            category: Some("All".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.category_filter(), None);
    }

    #[test]
    fn test_sort_aliases() {
        assert_eq!("popularity".parse::<SortBy>(), Ok(SortBy::Popular));
        assert_eq!("Recent".parse::<SortBy>(), Ok(SortBy::Newest));
        assert_eq!(
            "cheapest".parse::<SortBy>(),
            Err(FilterError::UnknownSort("cheapest".to_string()))
        );
    }

    #[test]
    fn test_invalid_price_ranges() {
        let reversed = filter_json(r#"{"priceRange": [50, 10]}"#);
        assert!(matches!(
            reversed.price_bounds(),
            Err(FilterError::PriceRangeOrder { .. })
        ));

        let single = filter_json(r#"{"priceRange": [50]}"#);
        assert_eq!(single.price_bounds(), Err(FilterError::PriceRangeLength(1)));
        assert_eq!(single.validate().unwrap_err().field(), "priceRange");

        let negative = filter_json(r#"{"priceRange": [-1, 10]}"#);
        assert_eq!(negative.price_bounds(), Err(FilterError::InvalidPrice));
    }
}
