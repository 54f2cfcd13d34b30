//! Sync pipeline services and the storage backends they talk to.

pub mod local_store;
pub mod locator_service;
pub mod provisioner_service;
pub mod s3_store;
pub mod storage_service;
pub mod upload_service;
