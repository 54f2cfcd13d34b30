//! Per-upload transfer metadata derived from the configuration.

use crate::{
    config::SyncConfig,
    models::{acl::AccessLevel, object::LocatedFile},
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub const CACHE_CONTROL: &str = "cache-control";
pub const EXPIRES: &str = "expires";
pub const CONTENT_ENCODING: &str = "content-encoding";
pub const CONTENT_TYPE: &str = "content-type";

/// Headers and grant attached to a single stored object.
///
/// Optional fields that are `None` are left out of the request entirely
/// rather than sent empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadMetadata {
    pub cache_control: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub content_encoding: Option<String>,
    pub content_type: Option<String>,
    pub access: AccessLevel,
}

impl UploadMetadata {
    /// Build the metadata for `file` from the configured defaults.
    ///
    /// Content type is guessed from the remote key, so `app.js.gz` (uploaded
    /// as `app.js`) is served as JavaScript with `content-encoding: gzip`.
    pub fn for_file(file: &LocatedFile, config: &SyncConfig) -> Self {
        Self {
            cache_control: config.cache_control.clone(),
            expires: config.expires,
            content_encoding: file.gzip.then(|| "gzip".to_string()),
            content_type: mime_guess::from_path(&file.remote_key)
                .first_raw()
                .map(str::to_string),
            access: config.access,
        }
    }

    /// Header map sent alongside the object body.
    pub fn headers(&self) -> BTreeMap<&'static str, String> {
        let mut headers = BTreeMap::new();
        if let Some(value) = &self.cache_control {
            headers.insert(CACHE_CONTROL, value.clone());
        }
        if let Some(value) = &self.expires {
            headers.insert(EXPIRES, http_date(value));
        }
        if let Some(value) = &self.content_encoding {
            headers.insert(CONTENT_ENCODING, value.clone());
        }
        if let Some(value) = &self.content_type {
            headers.insert(CONTENT_TYPE, value.clone());
        }
        headers
    }
}

/// Format a timestamp as an RFC 7231 HTTP-date.
pub fn http_date(value: &DateTime<Utc>) -> String {
    value.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn located(key: &str, gzip: bool) -> LocatedFile {
        LocatedFile {
            local_path: PathBuf::from("/app/public").join(key),
            remote_key: key.to_string(),
            gzip,
        }
    }

    #[test]
    fn omits_unset_headers() {
        let config = SyncConfig::sample("assets-bucket");
        let meta = UploadMetadata::for_file(&located("images/logo.png", false), &config);

        let headers = meta.headers();
        assert!(!headers.contains_key(CACHE_CONTROL));
        assert!(!headers.contains_key(EXPIRES));
        assert!(!headers.contains_key(CONTENT_ENCODING));
        assert_eq!(headers.get(CONTENT_TYPE).map(String::as_str), Some("image/png"));
        assert_eq!(meta.access, AccessLevel::PublicRead);
    }

    #[test]
    fn copies_configured_headers_and_flags_gzip() {
        let mut config = SyncConfig::sample("assets-bucket");
        config.cache_control = Some("max-age=315360000".into());
        config.expires = Some(Utc.with_ymd_and_hms(2094, 12, 1, 16, 0, 0).unwrap());
        config.access = AccessLevel::Private;

        let meta = UploadMetadata::for_file(&located("assets/app.js", true), &config);
        let headers = meta.headers();

        assert_eq!(headers[CACHE_CONTROL], "max-age=315360000");
        assert_eq!(headers[EXPIRES], "Wed, 01 Dec 2094 16:00:00 GMT");
        assert_eq!(headers[CONTENT_ENCODING], "gzip");
        assert!(headers[CONTENT_TYPE].contains("javascript"));
        assert_eq!(meta.access, AccessLevel::Private);
    }

    #[test]
    fn unknown_extension_has_no_content_type() {
        let config = SyncConfig::sample("assets-bucket");
        let meta = UploadMetadata::for_file(&located("assets/blob.zzqx", false), &config);
        assert_eq!(meta.content_type, None);
    }
}
