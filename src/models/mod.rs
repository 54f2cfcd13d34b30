//! Core data models for the asset sync pipeline.
//!
//! These types describe the destination bucket, the files picked up from the
//! local asset tree, and the metadata attached to each upload. Records read
//! back from the local store map to SQLite rows via `sqlx::FromRow` and
//! serialize as JSON via `serde`.

pub mod acl;
pub mod bucket;
pub mod metadata;
pub mod object;
