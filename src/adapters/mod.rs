pub mod api_handler;
pub mod execution_client;
pub mod health_handler;
pub mod schema_cache;
pub mod schema_loader;
pub mod schema_source;
