//! Canned access-control levels applied to buckets and objects.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// The closed set of canned grants the sync can request.
///
/// Parsed once while building the configuration, so an unknown value fails
/// before any network call is made.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    Private,
    #[default]
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "unknown access level `{0}` (expected private, public-read, public-read-write or authenticated-read)"
)]
pub struct ParseAccessLevelError(pub String);

impl AccessLevel {
    /// Wire name as used by S3 canned ACLs (`x-amz-acl`).
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Private => "private",
            AccessLevel::PublicRead => "public-read",
            AccessLevel::PublicReadWrite => "public-read-write",
            AccessLevel::AuthenticatedRead => "authenticated-read",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = ParseAccessLevelError;

    /// Accepts both `public-read` and `public_read` spellings, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "private" => Ok(AccessLevel::Private),
            "public-read" => Ok(AccessLevel::PublicRead),
            "public-read-write" => Ok(AccessLevel::PublicReadWrite),
            "authenticated-read" => Ok(AccessLevel::AuthenticatedRead),
            _ => Err(ParseAccessLevelError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_spellings() {
        assert_eq!("public_read".parse(), Ok(AccessLevel::PublicRead));
        assert_eq!("Public-Read".parse(), Ok(AccessLevel::PublicRead));
        assert_eq!(
            "authenticated_read".parse(),
            Ok(AccessLevel::AuthenticatedRead)
        );
        assert_eq!(" private ".parse(), Ok(AccessLevel::Private));
    }

    #[test]
    fn rejects_unknown_levels() {
        let err = "bucket-owner-full".parse::<AccessLevel>().unwrap_err();
        assert_eq!(err, ParseAccessLevelError("bucket-owner-full".into()));
    }

    #[test]
    fn display_matches_wire_name() {
        for level in [
            AccessLevel::Private,
            AccessLevel::PublicRead,
            AccessLevel::PublicReadWrite,
            AccessLevel::AuthenticatedRead,
        ] {
            assert_eq!(level.to_string().parse::<AccessLevel>(), Ok(level));
        }
        assert_eq!(AccessLevel::default().as_str(), "public-read");
    }
}
