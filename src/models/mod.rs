//! Core data models for the project API.
//!
//! Projects own their tasks and attachments. Rows map to structs via
//! `sqlx::FromRow`; responses serialize as camelCase JSON via `serde`.

pub mod attachment;
pub mod project;
