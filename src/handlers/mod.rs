pub mod docs_handlers;
pub mod file_handlers;
pub mod health_handlers;
pub mod project_handlers;
