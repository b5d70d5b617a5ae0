use crate::api::{Id, ValidatedJson};
use crate::auth::{AdminUser, AuthUser};
use crate::errors::ApiError;
use crate::models::{
    ChangePasswordRequest, MessageResponse, SignInRequest, SignUpRequest,
    TokenResponse, UpdateUserRoleRequest, UserQuery,
};
use crate::server::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use shop_models::{Product, User};
use shop_storage::Context;
use tracing::info;

pub async fn sign_up(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignUpRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    info!("API: Signing up: {}", req.user_name);
    let user = User {
        username: req.user_name.clone(),
        email: req.email.clone(),
        full_name: req.full_name.clone(),
        role: req.role(),
        ..Default::default()
    };
    let created = state
        .user_service
        .sign_up(&Context::new(), user, &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn sign_in(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignInRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let access_token = state
        .user_service
        .sign_in(&Context::new(), &req.user_name, &req.password)
        .await?;
    Ok(Json(TokenResponse { access_token }))
}

pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<User>, ApiError> {
    let user = state
        .user_service
        .profile(&Context::new(), claims.user_id)
        .await?;
    Ok(Json(user))
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .change_password(
            &Context::new(),
            claims.user_id,
            &req.current_password,
            &req.new_password,
        )
        .await?;
    Ok(Json(MessageResponse::new("password changed successfully")))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let filter = query
        .filter()
        .map_err(|msg| ApiError::bad_request("INVALID_REQUEST", msg))?;
    let users = state.user_service.list_users(&Context::new(), &filter).await?;
    Ok(Json(users))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Id(user_id): Id,
    ValidatedJson(req): ValidatedJson<UpdateUserRoleRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!("API: {} sets role of user {} to {}", admin.sub, user_id, req.role);
    state
        .user_service
        .update_role(&Context::new(), user_id, req.role())
        .await?;
    Ok(Json(MessageResponse::new("user role updated successfully")))
}

pub async fn add_to_wishlist(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Id(product_id): Id,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .add_to_wishlist(&Context::new(), claims.user_id, product_id)
        .await?;
    Ok(Json(MessageResponse::new("product added to wishlist")))
}

pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Id(product_id): Id,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .remove_from_wishlist(&Context::new(), claims.user_id, product_id)
        .await?;
    Ok(Json(MessageResponse::new("product removed from wishlist")))
}

pub async fn get_wishlist(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state
        .user_service
        .wishlist(&Context::new(), claims.user_id)
        .await?;
    Ok(Json(products))
}
