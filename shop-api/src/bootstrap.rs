use anyhow::Result;
use std::sync::Arc;

use crate::{
    auth::{Argon2PasswordHasher, TokenService},
    config::AppConfig,
    server::{ApiServer, AppState},
    services::{ProductService, UserService},
    storage::create_storage,
};

/// Wires storage, services and auth from a loaded configuration.
pub async fn build_app_state(config: &AppConfig) -> Result<AppState> {
    let storage = create_storage(&config.storage(), &config.cache()).await?;
    let auth = config.auth();
    let tokens = Arc::new(TokenService::new(&auth));
    let hasher = Argon2PasswordHasher::new(
        auth.password_memory_kib,
        auth.password_iterations,
        auth.password_parallelism,
    )?;

    let user_service = Arc::new(UserService::new(
        storage.users.clone(),
        storage.executor.clone(),
        Arc::new(hasher),
        tokens.clone(),
    ));
    let product_service = Arc::new(ProductService::new(
        storage.products.clone(),
        storage.executor.clone(),
    ));

    Ok(AppState {
        user_service,
        product_service,
        tokens,
        fast_store: storage.fast,
    })
}

/// Build a fully-wired ApiServer from environment variables.
pub async fn build_api_server_from_env() -> Result<ApiServer> {
    let config = AppConfig::load_from_env()?;
    let state = build_app_state(&config).await?;
    Ok(ApiServer::new(state, config.server()))
}
