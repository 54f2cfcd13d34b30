//! src/services/s3_store.rs
//!
//! S3Storage pushes objects to Amazon S3, or to any S3-compatible service
//! when a custom endpoint is configured.

use crate::{
    config::Credentials,
    models::{
        acl::AccessLevel,
        bucket::{Bucket, BucketLookup},
        metadata::UploadMetadata,
    },
    services::storage_service::{ObjectStorage, StorageError, StorageResult},
};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::Region,
    error::DisplayErrorContext,
    operation::{create_bucket::CreateBucketError, head_bucket::HeadBucketError},
    primitives::{ByteStream, DateTime},
    types::{BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl},
};
use bytes::Bytes;
use tracing::{debug, info};

/// Region that rejects an explicit location constraint on bucket creation.
const DEFAULT_REGION: &str = "us-east-1";

pub struct S3Storage {
    client: Client,
    region: String,
}

impl S3Storage {
    pub fn new(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Build a client from the configured credentials, or from the default
    /// provider chain (environment, profile, instance metadata) when none are
    /// configured.
    pub async fn connect(
        credentials: Option<&Credentials>,
        region: &str,
        endpoint_url: Option<&str>,
        force_path_style: bool,
    ) -> Self {
        let mut loader = aws_config::from_env().region(Region::new(region.to_string()));
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(creds) = credentials {
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                creds.access_key_id.clone(),
                creds.secret_access_key.clone(),
                None,
                None,
                "asset-sync",
            ));
        }
        let aws_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(force_path_style)
            .build();

        info!(
            "S3 client ready (region: {}, endpoint: {})",
            region,
            endpoint_url.unwrap_or("default")
        );
        Self::new(Client::from_conf(s3_config), region)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn find_bucket(&self, name: &str) -> StorageResult<BucketLookup> {
        match self.client.head_bucket().bucket(name).send().await {
            Ok(_) => Ok(BucketLookup::Found(Bucket {
                name: name.to_string(),
                region: self.region.clone(),
                created_at: None,
            })),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(HeadBucketError::is_not_found) =>
            {
                Ok(BucketLookup::NotFound)
            }
            Err(err) => Err(backend_error(err)),
        }
    }

    async fn create_bucket(
        &self,
        name: &str,
        region: &str,
        access: AccessLevel,
    ) -> StorageResult<()> {
        let request = self
            .client
            .create_bucket()
            .bucket(name)
            .acl(BucketCannedAcl::from(access.as_str()))
            .set_create_bucket_configuration(location_constraint(region).map(|constraint| {
                CreateBucketConfiguration::builder()
                    .location_constraint(constraint)
                    .build()
            }));

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(CreateBucketError::is_bucket_already_owned_by_you) =>
            {
                debug!("bucket {} already owned by this account", name);
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(CreateBucketError::is_bucket_already_exists) =>
            {
                Err(StorageError::BucketAlreadyExists(name.to_string()))
            }
            Err(err) => Err(backend_error(err)),
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: &UploadMetadata,
    ) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_cache_control(metadata.cache_control.clone())
            .set_expires(
                metadata
                    .expires
                    .map(|expires| DateTime::from_secs(expires.timestamp())),
            )
            .set_content_encoding(metadata.content_encoding.clone())
            .set_content_type(metadata.content_type.clone())
            .acl(ObjectCannedAcl::from(metadata.access.as_str()))
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn set_object_acl(
        &self,
        bucket: &str,
        key: &str,
        access: AccessLevel,
    ) -> StorageResult<()> {
        self.client
            .put_object_acl()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::from(access.as_str()))
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    /// The canned ACL travels with the PUT, so objects are never visible
    /// with the wrong grant.
    fn applies_grant_on_put(&self) -> bool {
        true
    }
}

fn location_constraint(region: &str) -> Option<BucketLocationConstraint> {
    if region.is_empty() || region.eq_ignore_ascii_case(DEFAULT_REGION) {
        None
    } else {
        Some(BucketLocationConstraint::from(region))
    }
}

fn backend_error(err: impl std::error::Error) -> StorageError {
    StorageError::Backend(DisplayErrorContext(&err).to_string())
}
