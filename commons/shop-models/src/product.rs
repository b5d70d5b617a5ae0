use crate::enums::ProductStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock_quantity: i32,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Product {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: String::new(),
            description: String::new(),
            price: 0.0,
            stock_quantity: 0,
            status: ProductStatus::InStock,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of products linked to the category. Only filled by listings.
    #[serde(default)]
    pub total: i64,
}

impl Default for Category {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: String::new(),
            description: String::new(),
            created_at: now,
            updated_at: now,
            total: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ProductCategory {
    pub product_id: i64,
    pub category_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub product_id: i64,
    pub user_id: i64,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Review {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            product_id: 0,
            user_id: 0,
            rating: 0,
            comment: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Row filters applied to product listings before pagination.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductFilter {
    /// Case-insensitive substring match on the product name.
    pub name: Option<String>,
    #[serde(default)]
    pub statuses: Vec<ProductStatus>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(ref name) = self.name {
            if !product.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }

        if !self.statuses.is_empty() && !self.statuses.contains(&product.status)
        {
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_filter_by_name_and_status() {
        let product = Product {
            name: "Apple Juice".into(),
            status: ProductStatus::OutOfStock,
            ..Default::default()
        };
        let by_name = ProductFilter {
            name: Some("app".into()),
            statuses: vec![],
        };
        assert!(by_name.matches(&product));

        let by_status = ProductFilter {
            name: None,
            statuses: vec![ProductStatus::InStock],
        };
        assert!(!by_status.matches(&product));
    }

    #[test]
    fn product_wire_format_is_camel_case() {
        let json = serde_json::to_value(Product {
            stock_quantity: 4,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["stockQuantity"], 4);
        assert_eq!(json["status"], "IN_STOCK");
    }
}
