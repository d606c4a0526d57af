pub mod categorize;
pub mod config;
pub mod dispatch;
pub mod enhance;
pub mod error;
pub mod models;
pub mod response;
pub mod server;
pub mod store;
pub mod tools;
pub mod translate;
