pub mod access;
pub mod auth;
pub mod catalog;
pub mod storage;
pub mod task;
pub mod task_image;
