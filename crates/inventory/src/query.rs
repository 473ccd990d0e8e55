//! Listing filters and pagination over products.

use serde::{Deserialize, Serialize};

use crate::catalog::{Brand, Category, Style};
use crate::product::Product;

/// Offset/limit pagination.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of rows to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// Cut one page out of an already ordered result set.
    pub fn apply<T>(&self, rows: Vec<T>) -> Vec<T> {
        rows.into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

/// Conjunction of optional product criteria. The default filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub brand: Option<Brand>,
    pub style: Option<Style>,
    pub category: Option<Category>,
    /// Case-insensitive substring of the product name.
    pub name_contains: Option<String>,
    /// Only products with stock on hand.
    #[serde(default)]
    pub in_stock_only: bool,
}

impl ProductFilter {
    pub fn brand(brand: Brand) -> Self {
        Self {
            brand: Some(brand),
            ..Self::default()
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        let metadata = product.metadata();
        if self.brand.is_some_and(|b| b != metadata.brand) {
            return false;
        }
        if self.style.is_some_and(|s| s != metadata.style) {
            return false;
        }
        if self.category.is_some_and(|c| c != metadata.category) {
            return false;
        }
        if self.in_stock_only && product.total_quantity() <= 0 {
            return false;
        }
        match self.name_contains.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => product
                .name()
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        }
    }
}

/// Filter, order by name (case-insensitive, then id) and paginate.
pub fn select(
    products: impl IntoIterator<Item = Product>,
    filter: &ProductFilter,
    page: Option<Pagination>,
) -> Vec<Product> {
    let mut rows: Vec<Product> = products.into_iter().filter(|p| filter.matches(p)).collect();
    rows.sort_by(|a, b| {
        a.name()
            .to_lowercase()
            .cmp(&b.name().to_lowercase())
            .then_with(|| a.id_typed().cmp(&b.id_typed()))
    });
    match page {
        Some(page) => page.apply(rows),
        None => rows,
    }
}
