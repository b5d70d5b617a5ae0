use crate::{
    api::{handlers, with_middleware},
    auth::TokenService,
    config::ServerConfig,
    services::{ProductService, UserService},
};
use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post, put},
};
use shop_observability::{HealthCheck, HealthReport};
use shop_storage::fast::FastStore;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub product_service: Arc<ProductService>,
    pub tokens: Arc<TokenService>,
    pub fast_store: Arc<dyn FastStore>,
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

pub struct ApiServer {
    app: Router,
    config: ServerConfig,
}

impl ApiServer {
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        let routes = Router::new()
            // Accounts
            .route("/signup", post(handlers::sign_up))
            .route("/signin", post(handlers::sign_in))
            .route("/profile", get(handlers::get_profile))
            .route("/change-password", post(handlers::change_password))
            .route("/admin/users", get(handlers::list_users))
            .route("/admin/users/{id}/role", put(handlers::update_user_role))
            // Wishlist
            .route("/wishlist", get(handlers::get_wishlist))
            .route(
                "/wishlist/{productId}",
                post(handlers::add_to_wishlist).delete(handlers::remove_from_wishlist),
            )
            // Catalogue
            .route("/categories", get(handlers::list_categories))
            .route("/categories/{id}", get(handlers::get_category))
            .route(
                "/categories/{id}/products",
                get(handlers::list_products_by_category),
            )
            .route("/products", get(handlers::list_products))
            .route("/products/{id}", get(handlers::get_product))
            .route("/products/{id}/reviews", post(handlers::create_review))
            // Catalogue administration
            .route("/admin/categories", post(handlers::create_category))
            .route(
                "/admin/categories/{id}",
                put(handlers::update_category).delete(handlers::delete_category),
            )
            .route("/admin/products", post(handlers::create_product))
            .route(
                "/admin/products/{id}",
                put(handlers::update_product).delete(handlers::delete_product),
            )
            .route("/admin/reviews", get(handlers::list_reviews))
            .route(
                "/admin/reviews/{id}",
                axum::routing::delete(handlers::delete_review),
            )
            // Live activity counters
            .route("/admin/activity-stats/ws", get(handlers::activity_stats_ws))
            .route("/health", get(health_check));
        let app = with_middleware(routes).with_state(state);

        Self { app, config }
    }

    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("Storefront API server listening on {}", listener.local_addr()?);
        info!("Health check available at: http://{}/health", addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    /// Consume and return the underlying Axum Router so callers can serve it themselves
    pub fn into_router(self) -> Router {
        self.app
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = HealthReport::new("shop-api", env!("CARGO_PKG_VERSION"))
        .with_check("users", HealthCheck::from_result(state.user_service.health().await))
        .with_check(
            "products",
            HealthCheck::from_result(state.product_service.health().await),
        )
        .with_check("cache", HealthCheck::from_result(state.fast_store.ping().await));
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
