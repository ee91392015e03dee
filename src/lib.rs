#![doc = "The `todo_auth` library crate."]
#![doc = ""]
#![doc = "Authentication and session tokens for the todo backend: login, refresh-token"]
#![doc = "rotation, password reset, the stores behind them, routing configuration and"]
#![doc = "error handling. The binary (`main.rs`) wires these into an actix-web server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

pub use crate::error::AppError;
pub use crate::services::AppServices;
