use serde::{Deserialize, Serialize};

use super::error::{CatalogError, Result};

/// Product table name in the relational store
pub const PRODUCTS_TABLE: &str = "products";

/// Catalog columns, in the order they are read and displayed.
///
/// The SQL select list and the result table header are both derived from
/// [`Column::ALL`], so reordering happens here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Name,
    Price,
    Category,
    Description,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Id,
        Column::Name,
        Column::Price,
        Column::Category,
        Column::Description,
    ];

    /// Column name in the relational store and in index metadata
    pub fn key(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Price => "price",
            Self::Category => "category",
            Self::Description => "description",
        }
    }

    /// Human-readable header
    pub fn title(self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Name => "Name",
            Self::Price => "Price",
            Self::Category => "Category",
            Self::Description => "Description",
        }
    }

    /// Comma-separated select list in display order
    pub fn select_list() -> String {
        Self::ALL
            .iter()
            .map(|c| c.key())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A product row from the relational store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub category: String,
    #[serde(default)]
    pub description: String,
}

impl CatalogRecord {
    /// Reject records that would index or display ambiguously
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::malformed(self.id, "name is empty"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(CatalogError::malformed(
                self.id,
                format!("price must be a non-negative number, got {}", self.price),
            ));
        }
        Ok(())
    }

    pub fn price_text(&self) -> String {
        format_price(self.price)
    }
}

/// Prices are stored as decimals with two fractional digits
pub fn format_price(price: f64) -> String {
    format!("{:.2}", price)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mug() -> CatalogRecord {
        CatalogRecord {
            id: 1,
            name: "Red Mug".to_string(),
            price: 9.99,
            category: "Kitchen".to_string(),
            description: "A red ceramic mug".to_string(),
        }
    }

    #[test]
    fn test_select_list_follows_column_order() {
        assert_eq!(Column::select_list(), "id, name, price, category, description");
    }

    #[test]
    fn test_validate() {
        assert!(mug().validate().is_ok());

        let mut negative = mug();
        negative.price = -1.0;
        assert!(matches!(
            negative.validate(),
            Err(CatalogError::MalformedRecord { id: 1, .. })
        ));

        let mut unnamed = mug();
        unnamed.name = "  ".to_string();
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_price_text() {
        assert_eq!(mug().price_text(), "9.99");
        assert_eq!(format_price(5.0), "5.00");
    }
}
