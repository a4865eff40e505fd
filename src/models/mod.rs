pub mod auth;
pub mod image;
pub mod task;
