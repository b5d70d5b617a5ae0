pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod models;
pub mod server;
pub mod services;
pub mod storage;

pub use config::*;
pub use errors::*;
pub use server::{ApiServer, AppState};
pub use services::{ProductService, UserService};

pub use api::with_middleware;
pub use bootstrap::{build_api_server_from_env, build_app_state};
