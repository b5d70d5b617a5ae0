use serde::Deserialize;
use shop_models::UserRole;
use validator::{Validate, ValidationError};

fn validate_role(role: &str) -> Result<(), ValidationError> {
    role.parse::<UserRole>().map(|_| ()).map_err(|_| {
        ValidationError::new("role")
            .with_message("role must be one of: user, admin".into())
    })
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[validate(length(min = 1, message = "User name cannot be empty"))]
    pub user_name: String,
    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: String,
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Full name cannot be empty"))]
    pub full_name: String,
    #[validate(custom(function = "validate_role"))]
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    UserRole::User.as_str().to_string()
}

impl SignUpRequest {
    /// The requested role. Only meaningful after validation.
    pub fn role(&self) -> UserRole {
        self.role.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[validate(length(min = 1, message = "User name cannot be empty"))]
    pub user_name: String,
    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password cannot be empty"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "New password must have at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserRoleRequest {
    #[validate(custom(function = "validate_role"))]
    pub role: String,
}

impl UpdateUserRoleRequest {
    pub fn role(&self) -> UserRole {
        self.role.parse().unwrap_or_default()
    }
}

/// Body of category create and update.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, message = "Category name cannot be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "Category description cannot be empty"))]
    pub description: String,
}

/// Body of product create and update. On update the category links are
/// replaced by `category_ids`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    #[validate(length(min = 1, message = "Product name cannot be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "Product description cannot be empty"))]
    pub description: String,
    #[validate(range(exclusive_min = 0.0, message = "Price must be greater than 0"))]
    pub price: f64,
    #[validate(range(min = 0, message = "Stock quantity cannot be negative"))]
    pub stock_quantity: i32,
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(min = 1, message = "Comment cannot be empty"))]
    pub comment: String,
}
