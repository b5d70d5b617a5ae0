use crate::api::{Id, ValidatedJson};
use crate::auth::{AdminUser, AuthUser};
use crate::errors::ApiError;
use crate::models::{
    CategoryRequest, CreateReviewRequest, MessageResponse, ProductQuery, ProductRequest,
    ReviewQuery,
};
use crate::server::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use shop_models::{Category, Product, Review};
use shop_storage::{Context, Page};

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = state.product_service.list_categories(&Context::new()).await?;
    Ok(Json(categories))
}

pub async fn get_category(
    State(state): State<AppState>,
    Id(id): Id,
) -> Result<Json<Category>, ApiError> {
    let category = state.product_service.get_category(&Context::new(), id).await?;
    Ok(Json(category))
}

pub async fn list_products_by_category(
    State(state): State<AppState>,
    Id(category_id): Id,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state
        .product_service
        .list_products_by_category(&Context::new(), category_id)
        .await?;
    Ok(Json(products))
}

pub async fn create_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    ValidatedJson(req): ValidatedJson<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let created = state
        .product_service
        .create_category(&Context::new(), req)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
    ValidatedJson(req): ValidatedJson<CategoryRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .product_service
        .update_category(&Context::new(), id, req)
        .await?;
    Ok(Json(MessageResponse::new("category updated successfully")))
}

pub async fn delete_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .product_service
        .delete_category(&Context::new(), id)
        .await?;
    Ok(Json(MessageResponse::new("category deleted successfully")))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Page<Product>>, ApiError> {
    let filter = query
        .filter()
        .map_err(|msg| ApiError::bad_request("INVALID_REQUEST", msg))?;
    let page = state
        .product_service
        .list_products(&Context::new(), &filter, &query.paging())
        .await?;
    Ok(Json(page))
}

pub async fn get_product(
    State(state): State<AppState>,
    Id(id): Id,
) -> Result<Json<Product>, ApiError> {
    let product = state.product_service.get_product(&Context::new(), id).await?;
    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    ValidatedJson(req): ValidatedJson<ProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let created = state
        .product_service
        .create_product(&Context::new(), req)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
    ValidatedJson(req): ValidatedJson<ProductRequest>,
) -> Result<Json<Product>, ApiError> {
    let updated = state
        .product_service
        .update_product(&Context::new(), id, req)
        .await?;
    Ok(Json(updated))
}

pub async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .product_service
        .delete_product(&Context::new(), id)
        .await?;
    Ok(Json(MessageResponse::new("product deleted successfully")))
}

pub async fn create_review(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Id(product_id): Id,
    ValidatedJson(req): ValidatedJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let created = state
        .product_service
        .create_review(&Context::new(), product_id, claims.user_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let reviews = state
        .product_service
        .list_reviews(&Context::new(), query.product_name.as_deref())
        .await?;
    Ok(Json(reviews))
}

pub async fn delete_review(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .product_service
        .delete_review(&Context::new(), id)
        .await?;
    Ok(Json(MessageResponse::new("review deleted successfully")))
}
