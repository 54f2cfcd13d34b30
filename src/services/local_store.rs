//! src/services/local_store.rs
//!
//! LocalObjectStore is an S3-like bucket kept on the local machine, with SQLite
//! for bucket/object metadata and local disk for payloads sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`. Used to stage a sync without
//! touching a remote service.

use crate::{
    models::{
        acl::AccessLevel,
        bucket::{Bucket, BucketLookup},
        metadata::UploadMetadata,
    },
    services::storage_service::{ObjectStorage, StorageError, StorageResult},
};
#[cfg(test)]
use crate::models::object::StoredObject;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct LocalObjectStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,
}

#[derive(FromRow)]
struct BucketRow {
    id: Uuid,
    name: String,
    region: String,
    created_at: DateTime<Utc>,
}

impl From<BucketRow> for Bucket {
    fn from(row: BucketRow) -> Self {
        Bucket {
            name: row.name,
            region: row.region,
            created_at: Some(row.created_at),
        }
    }
}

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const REGION_MAX_LEN: usize = 32;

impl LocalObjectStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Open (creating if needed) the metadata database and payload directory,
    /// then apply the embedded migrations.
    pub async fn open(storage_dir: impl Into<PathBuf>, database_url: &str) -> StorageResult<Self> {
        let base_path = storage_dir.into();
        fs::create_dir_all(&base_path).await?;

        let in_memory = database_url.contains(":memory:");
        if !in_memory {
            let db_path = database_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:")
                .trim_start_matches("file:");
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent).await?;
                    debug!("created missing directory {}", parent.display());
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is a fresh database, so pin one.
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("local store ready at {}", base_path.display());

        Ok(Self::new(Arc::new(pool), base_path))
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects keys that begin with `/` or have an empty, `.` or `..` segment.
    /// Dots inside a file name (`jquery..min.js`) are fine.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StorageError::InvalidObjectKey);
        }
        if key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(StorageError::InvalidObjectKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::InvalidObjectKey);
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// Enforces S3-like naming rules:
    /// - 3 to 63 characters
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start/end with dot or hyphen
    /// - cannot contain consecutive dots or dot-hyphen patterns
    /// - cannot look like an IPv4 address
    fn ensure_bucket_name_safe(&self, name: &str) -> StorageResult<()> {
        let invalid = |reason: &str| StorageError::InvalidBucketName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.trim() != name {
            return Err(invalid("cannot begin or end with whitespace"));
        }

        if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&name.len()) {
            return Err(invalid("must be between 3 and 63 characters"));
        }

        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return Err(invalid(
                "allowed characters are lowercase letters, digits, dots, and hyphens",
            ));
        }

        if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
            return Err(invalid("must start and end with a lowercase letter or digit"));
        }

        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return Err(invalid(
                "cannot contain consecutive dots or dot-hyphen combinations",
            ));
        }

        if is_ipv4_like(name) {
            return Err(invalid("must not be formatted like an IP address"));
        }

        Ok(())
    }

    /// Any region-shaped name is accepted (`local`, `eu-central-1`, ...); it is
    /// only recorded on the bucket row.
    fn ensure_region_valid(&self, region: &str) -> StorageResult<()> {
        if !region.is_empty()
            && region.len() <= REGION_MAX_LEN
            && region
                .chars()
                .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
            && !region.starts_with('-')
            && !region.ends_with('-')
        {
            Ok(())
        } else {
            Err(StorageError::UnsupportedRegion(region.to_string()))
        }
    }

    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        self.base_path.join(bucket_name)
    }

    /// Two-level shard identifiers: the first two bytes of MD5(bucket/key) as hex.
    fn object_shards(bucket_name: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Combines base_path/bucket/{shard}/{shard}/{key}. Parent directories may
    /// not exist yet.
    fn object_path(&self, bucket_name: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket_name, key);
        let mut path = self.bucket_root(bucket_name);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_bucket(&self, bucket: &str) -> StorageResult<BucketRow> {
        self.ensure_bucket_name_safe(bucket)?;
        sqlx::query_as::<_, BucketRow>(
            "SELECT id, name, region, created_at FROM buckets WHERE name = ?",
        )
        .bind(bucket)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::BucketNotFound(bucket.to_string()),
            other => StorageError::Sqlx(other),
        })
    }

    /// Fetch the metadata record of a stored object.
    #[cfg(test)]
    pub async fn get_object_metadata(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        sqlx::query_as::<_, StoredObject>(
            "SELECT key, size_bytes, etag, content_type, cache_control, expires,
                    content_encoding, acl, last_modified
             FROM objects WHERE bucket_id = ? AND key = ?",
        )
        .bind(bucket_rec.id)
        .bind(key)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            other => StorageError::Sqlx(other),
        })
    }

    /// Metadata plus an opened handle on the payload.
    #[cfg(test)]
    pub async fn get_object_reader(
        &self,
        bucket: &str,
        key: &str,
    ) -> StorageResult<(StoredObject, File)> {
        let object = self.get_object_metadata(bucket, key).await?;
        let file = File::open(self.object_path(bucket, key))
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    StorageError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Io(err)
                }
            })?;
        Ok((object, file))
    }

    /// Write the payload to a temp file beside its final location and fsync
    /// it. Returns the temp path; the caller renames it into place.
    async fn stage_payload(&self, file_path: &Path, body: &[u8]) -> StorageResult<PathBuf> {
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(body).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        Ok(tmp_path)
    }

    /// Rename a staged payload over any previous version.
    async fn commit_payload(tmp_path: &Path, file_path: &Path) -> io::Result<()> {
        match fs::rename(tmp_path, file_path).await {
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                fs::remove_file(file_path).await?;
                fs::rename(tmp_path, file_path).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStore {
    async fn find_bucket(&self, name: &str) -> StorageResult<BucketLookup> {
        match self.fetch_bucket(name).await {
            Ok(row) => Ok(BucketLookup::Found(row.into())),
            Err(StorageError::BucketNotFound(_)) => Ok(BucketLookup::NotFound),
            Err(err) => Err(err),
        }
    }

    /// Validates name and region, creates the bucket folder and inserts the
    /// metadata row. A name conflict is `BucketAlreadyExists`.
    async fn create_bucket(
        &self,
        name: &str,
        region: &str,
        access: AccessLevel,
    ) -> StorageResult<()> {
        self.ensure_bucket_name_safe(name)?;
        let normalized_region = region.to_lowercase();
        self.ensure_region_valid(&normalized_region)?;
        fs::create_dir_all(self.bucket_root(name)).await?;

        match sqlx::query(
            "INSERT INTO buckets (id, name, region, acl, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(&normalized_region)
        .bind(access.as_str())
        .bind(Utc::now())
        .execute(&*self.db)
        .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StorageError::BucketAlreadyExists(name.to_string()))
            }
            Err(err) => Err(StorageError::Sqlx(err)),
        }
    }

    /// Store the payload and upsert its metadata. Like a plain S3 PUT, the
    /// object comes back `private` until a grant is applied.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: &UploadMetadata,
    ) -> StorageResult<()> {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;

        let file_path = self.object_path(&bucket_rec.name, key);
        let tmp_path = self.stage_payload(&file_path, &body).await?;

        // Upsert before the rename, commit after it: a failed upsert or rename
        // leaves the previous version's row and payload in place.
        let etag = format!("{:x}", md5::compute(&body));
        let stored = async {
            let mut tx = self.db.begin().await?;
            sqlx::query(
                r#"
                INSERT INTO objects (
                    id, bucket_id, key, size_bytes, etag, content_type, cache_control,
                    expires, content_encoding, acl, last_modified
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(bucket_id, key) DO UPDATE SET
                    size_bytes = excluded.size_bytes,
                    etag = excluded.etag,
                    content_type = excluded.content_type,
                    cache_control = excluded.cache_control,
                    expires = excluded.expires,
                    content_encoding = excluded.content_encoding,
                    acl = excluded.acl,
                    last_modified = excluded.last_modified
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(bucket_rec.id)
            .bind(key)
            .bind(body.len() as i64)
            .bind(&etag)
            .bind(metadata.content_type.as_deref())
            .bind(metadata.cache_control.as_deref())
            .bind(metadata.expires)
            .bind(metadata.content_encoding.as_deref())
            .bind(AccessLevel::Private.as_str())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

            Self::commit_payload(&tmp_path, &file_path).await?;
            tx.commit().await?;
            Ok::<_, StorageError>(())
        }
        .await;

        if let Err(err) = stored {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
        debug!("stored {} ({} bytes) at {}", key, body.len(), file_path.display());
        Ok(())
    }

    async fn set_object_acl(
        &self,
        bucket: &str,
        key: &str,
        access: AccessLevel,
    ) -> StorageResult<()> {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        let result = sqlx::query("UPDATE objects SET acl = ? WHERE bucket_id = ? AND key = ?")
            .bind(access.as_str())
            .bind(bucket_rec.id)
            .bind(key)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// Check if a string matches IPv4-like dotted decimal form (`1.2.3.4`).
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
