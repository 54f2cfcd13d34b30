//! src/services/upload_service.rs
//!
//! Pushes located files into the bucket one at a time: read, store, grant.
//! The first failure stops the run; objects already pushed are left in place.

use crate::{
    config::SyncConfig,
    errors::{SyncError, SyncResult},
    models::{bucket::Bucket, metadata::UploadMetadata, object::LocatedFile},
    services::storage_service::ObjectStorage,
};
use bytes::Bytes;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Totals for a completed sync.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub bucket: String,
    pub files_uploaded: usize,
    pub bytes_uploaded: u64,
    pub gzip_encoded: usize,
}

pub struct UploadOrchestrator<'a, S: ObjectStorage + ?Sized> {
    storage: &'a S,
    cancel: CancellationToken,
}

impl<'a, S: ObjectStorage + ?Sized> UploadOrchestrator<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self {
            storage,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop before the next file once `cancel` fires. A file already in
    /// flight still completes its store and grant.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Upload every file in order.
    ///
    /// Between the store and the grant an object briefly carries the
    /// backend's default grant; re-running the sync re-applies both steps.
    pub async fn sync(
        &self,
        bucket: &Bucket,
        files: &[LocatedFile],
        config: &SyncConfig,
    ) -> SyncResult<SyncSummary> {
        info!("Pushing assets to bucket: {}", bucket.name);

        let mut summary = SyncSummary {
            bucket: bucket.name.clone(),
            ..SyncSummary::default()
        };

        for file in files {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled {
                    uploaded: summary.files_uploaded,
                    total: files.len(),
                });
            }

            let body = tokio::fs::read(&file.local_path)
                .await
                .map_err(|err| SyncError::local_read(&file.local_path, err))?;
            let size = body.len() as u64;
            let metadata = UploadMetadata::for_file(file, config);

            info!("pushing file: {}", file.remote_key);
            debug!(
                "{} -> {} ({} bytes, headers: {:?})",
                file.local_path.display(),
                file.remote_key,
                size,
                metadata.headers()
            );

            self.storage
                .put_object(&bucket.name, &file.remote_key, Bytes::from(body), &metadata)
                .await
                .map_err(|source| SyncError::RemoteStore {
                    key: file.remote_key.clone(),
                    source,
                })?;

            if !self.storage.applies_grant_on_put() {
                self.storage
                    .set_object_acl(&bucket.name, &file.remote_key, config.access)
                    .await
                    .map_err(|source| SyncError::RemoteGrant {
                        key: file.remote_key.clone(),
                        access: config.access,
                        source,
                    })?;
            }

            summary.files_uploaded += 1;
            summary.bytes_uploaded += size;
            if file.gzip {
                summary.gzip_encoded += 1;
            }
        }

        info!(
            "Pushed {} files ({} bytes) to {}",
            summary.files_uploaded, summary.bytes_uploaded, summary.bucket
        );
        Ok(summary)
    }
}
