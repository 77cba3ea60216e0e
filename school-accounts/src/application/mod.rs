pub mod relations;
pub mod user_service;
