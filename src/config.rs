use crate::models::acl::AccessLevel;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use std::{env, fmt, path::PathBuf};

/// Centralized sync configuration.
/// Combines environment variables and CLI arguments; built once and passed
/// by reference to every component.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub bucket: String,
    pub credentials: Option<Credentials>,
    pub region: String,
    pub cache_control: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub access: AccessLevel,
    pub upload_globs: Vec<String>,
    pub packaging: Packaging,
    pub package_path: String,
    pub asset_root: PathBuf,
    pub backend: StorageBackend,
    pub json_summary: bool,
}

/// Static access key pair. The secret never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// How compiled packages were written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packaging {
    /// Only `*.gz` files are pushed, with `content-encoding: gzip`.
    Gzip,
    /// Plain `*.css` and `*.js` files.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    S3 {
        endpoint_url: Option<String>,
        force_path_style: bool,
    },
    Local {
        storage_dir: String,
        database_url: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    S3,
    Local,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Push compiled assets to an object-storage bucket")]
pub struct Args {
    /// Destination bucket (overrides ASSET_SYNC_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Access key id (overrides AWS_ACCESS_KEY_ID)
    #[arg(long)]
    pub access_key_id: Option<String>,

    /// Secret access key (overrides AWS_SECRET_ACCESS_KEY)
    #[arg(long)]
    pub secret_access_key: Option<String>,

    /// Bucket region (overrides ASSET_SYNC_REGION / AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint (overrides ASSET_SYNC_ENDPOINT_URL)
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long)]
    pub force_path_style: bool,

    /// Cache-Control header for every object (overrides ASSET_SYNC_CACHE_CONTROL)
    #[arg(long)]
    pub cache_control: Option<String>,

    /// Expires header as an HTTP date (overrides ASSET_SYNC_EXPIRES)
    #[arg(long)]
    pub expires: Option<String>,

    /// Canned ACL for the bucket and objects (overrides ASSET_SYNC_ACL)
    #[arg(long)]
    pub acl: Option<String>,

    /// Extra glob, relative to the asset root; may be repeated
    /// (overrides the comma-separated ASSET_SYNC_UPLOAD_FILES)
    #[arg(long = "upload-glob")]
    pub upload_globs: Vec<String>,

    /// Push gzip-packaged assets (`*.gz`) instead of raw css/js
    #[arg(long)]
    pub gzip: bool,

    /// Directory under `public/` holding compiled packages (overrides ASSET_SYNC_PACKAGE_PATH)
    #[arg(long)]
    pub package_path: Option<String>,

    /// Project root containing `public/` (overrides ASSET_SYNC_ROOT)
    #[arg(long)]
    pub asset_root: Option<PathBuf>,

    /// Storage backend (overrides ASSET_SYNC_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Local backend object directory (overrides ASSET_SYNC_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Local backend database URL (overrides ASSET_SYNC_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Print a JSON summary on stdout when the sync completes
    #[arg(long)]
    pub json: bool,
}

impl SyncConfig {
    /// Parse environment variables + CLI args into a SyncConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |key| env::var(key).ok())
    }

    /// Merge parsed args over values from `lookup`, flag first.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bucket = args
            .bucket
            .or_else(|| non_empty("ASSET_SYNC_BUCKET"))
            .context("a bucket name is required (--bucket or ASSET_SYNC_BUCKET)")?;

        let access_key_id = args
            .access_key_id
            .or_else(|| non_empty("AWS_ACCESS_KEY_ID"));
        let secret_access_key = args
            .secret_access_key
            .or_else(|| non_empty("AWS_SECRET_ACCESS_KEY"));
        let credentials = match (access_key_id, secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(Credentials {
                access_key_id,
                secret_access_key,
            }),
            (None, None) => None,
            _ => bail!("access key id and secret access key must be set together"),
        };

        let region = args
            .region
            .or_else(|| non_empty("ASSET_SYNC_REGION"))
            .or_else(|| non_empty("AWS_REGION"))
            .unwrap_or_else(|| "us-east-1".into());

        let cache_control = args
            .cache_control
            .or_else(|| non_empty("ASSET_SYNC_CACHE_CONTROL"));

        let expires = match args.expires.or_else(|| non_empty("ASSET_SYNC_EXPIRES")) {
            Some(value) => Some(
                DateTime::parse_from_rfc2822(value.trim())
                    .with_context(|| format!("parsing expires value `{}` as an HTTP date", value))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let access = match args.acl.or_else(|| non_empty("ASSET_SYNC_ACL")) {
            Some(value) => value.parse::<AccessLevel>()?,
            None => AccessLevel::default(),
        };

        let upload_globs = if args.upload_globs.is_empty() {
            non_empty("ASSET_SYNC_UPLOAD_FILES")
                .map(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        } else {
            args.upload_globs
        };

        let gzip = if args.gzip {
            true
        } else {
            match non_empty("ASSET_SYNC_GZIP") {
                Some(value) => parse_bool(&value)
                    .with_context(|| format!("parsing ASSET_SYNC_GZIP value `{}`", value))?,
                None => false,
            }
        };

        let package_path = args
            .package_path
            .or_else(|| non_empty("ASSET_SYNC_PACKAGE_PATH"))
            .unwrap_or_else(|| "assets".into());
        let package_path = package_path.trim_matches('/').to_string();

        let asset_root = args
            .asset_root
            .or_else(|| non_empty("ASSET_SYNC_ROOT").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let backend_kind = match args.backend {
            Some(kind) => kind,
            None => match non_empty("ASSET_SYNC_BACKEND") {
                Some(value) => BackendKind::from_str(&value, true)
                    .map_err(|err| anyhow::anyhow!(err))
                    .with_context(|| format!("parsing ASSET_SYNC_BACKEND value `{}`", value))?,
                None => BackendKind::S3,
            },
        };

        let backend = match backend_kind {
            BackendKind::S3 => StorageBackend::S3 {
                endpoint_url: args
                    .endpoint_url
                    .or_else(|| non_empty("ASSET_SYNC_ENDPOINT_URL")),
                force_path_style: args.force_path_style,
            },
            BackendKind::Local => StorageBackend::Local {
                storage_dir: args
                    .storage_dir
                    .or_else(|| non_empty("ASSET_SYNC_STORAGE_DIR"))
                    .unwrap_or_else(|| "./data/objects".into()),
                database_url: args
                    .database_url
                    .or_else(|| non_empty("ASSET_SYNC_DATABASE_URL"))
                    .unwrap_or_else(|| "sqlite://./data/meta/asset_sync.db".into()),
            },
        };

        Ok(Self {
            bucket,
            credentials,
            region,
            cache_control,
            expires,
            access,
            upload_globs,
            packaging: if gzip { Packaging::Gzip } else { Packaging::Raw },
            package_path,
            asset_root,
            backend,
            json_summary: args.json,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got `{}`", other),
    }
}

#[cfg(test)]
impl SyncConfig {
    /// Defaults for a raw-packaged sync into `bucket` on the local backend.
    pub fn sample(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            credentials: None,
            region: "us-east-1".into(),
            cache_control: None,
            expires: None,
            access: AccessLevel::PublicRead,
            upload_globs: Vec::new(),
            packaging: Packaging::Raw,
            package_path: "assets".into(),
            asset_root: PathBuf::from("."),
            backend: StorageBackend::Local {
                storage_dir: "./data/objects".into(),
                database_url: "sqlite::memory:".into(),
            },
            json_summary: false,
        }
    }
}
