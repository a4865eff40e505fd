pub mod config;
pub mod database;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use database::Database;
