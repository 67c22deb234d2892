//! Semantic version parsing and version gates.
//!
//! DCE controllers report their release as a version string. Operations that
//! only exist on some releases check the session's resolved version with
//! [`minimum_version`] or [`maximum_version`] before doing any work.

use crate::{Error, Result};
use semver::Version;

/// Parse a server version string.
///
/// Accepts a leading `v` and pads missing minor/patch components with zero, so
/// `"2.7"` parses as `2.7.0`.
///
/// # Errors
///
/// Returns [`Error::InvalidVersion`] when the string is not a version.
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);

    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => trimmed.to_string(),
    };

    Version::parse(&padded)
        .map_err(|err| Error::InvalidVersion(format!("Invalid version `{raw}`: {err}")))
}

/// Fail unless `current` is at least `required`.
///
/// # Errors
///
/// Returns [`Error::InvalidVersion`] naming `operation` when `current` is
/// older than `required`, or when `required` is not a version.
pub fn minimum_version(current: &Version, required: &str, operation: &str) -> Result<()> {
    let boundary = parse_version(required)?;
    if *current < boundary {
        return Err(Error::InvalidVersion(format!(
            "{operation} is not available for DCE version < {required}"
        )));
    }
    Ok(())
}

/// Fail unless `current` is at most `allowed`.
///
/// # Errors
///
/// Returns [`Error::InvalidVersion`] naming `operation` when `current` is
/// newer than `allowed`, or when `allowed` is not a version.
pub fn maximum_version(current: &Version, allowed: &str, operation: &str) -> Result<()> {
    let boundary = parse_version(allowed)?;
    if *current > boundary {
        return Err(Error::InvalidVersion(format!(
            "{operation} is not available for DCE version > {allowed}"
        )));
    }
    Ok(())
}

/// A session whose server version was resolved when it was constructed.
pub trait Versioned {
    /// The resolved server version.
    fn server_version(&self) -> &Version;

    /// Gate `operation` on a minimum server version.
    ///
    /// # Errors
    ///
    /// See [`minimum_version`].
    fn require_minimum(&self, operation: &str, required: &str) -> Result<()> {
        minimum_version(self.server_version(), required, operation)
    }

    /// Gate `operation` on a maximum server version.
    ///
    /// # Errors
    ///
    /// See [`maximum_version`].
    fn require_maximum(&self, operation: &str, allowed: &str) -> Result<()> {
        maximum_version(self.server_version(), allowed, operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Version);

    impl Versioned for Fixed {
        fn server_version(&self) -> &Version {
            &self.0
        }
    }

    fn v(raw: &str) -> Version {
        parse_version(raw).unwrap()
    }

    #[test]
    fn test_parse_full_version() {
        assert_eq!(v("2.7.14"), Version::new(2, 7, 14));
        assert_eq!(v(" v2.10.1 "), Version::new(2, 10, 1));
    }

    #[test]
    fn test_parse_pads_missing_components() {
        assert_eq!(v("3"), Version::new(3, 0, 0));
        assert_eq!(v("2.8"), Version::new(2, 8, 0));
        assert_eq!(v("2.8-rc1").pre.as_str(), "rc1");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_version("latest").unwrap_err();
        assert!(matches!(err, Error::InvalidVersion(_)));
        assert!(parse_version("").is_err());
    }

    #[test]
    fn test_ordering_is_semantic_not_lexical() {
        assert!(v("2.10.0") > v("2.9.0"));
        assert!(v("2.7.14") > v("2.7.13"));
        assert!(minimum_version(&v("2.10.0"), "2.9.0", "op").is_ok());
    }

    #[test]
    fn test_minimum_version_gate() {
        assert!(minimum_version(&v("2.7.13"), "2.7.13", "mode").is_ok());
        let err = minimum_version(&v("2.6.0"), "2.7.13", "mode").unwrap_err();
        assert_eq!(
            err,
            Error::InvalidVersion("mode is not available for DCE version < 2.7.13".to_string())
        );
    }

    #[test]
    fn test_maximum_version_gate() {
        assert!(maximum_version(&v("2.7.0"), "2.7.0", "legacy").is_ok());
        let err = maximum_version(&v("2.8.0"), "2.7.0", "legacy").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid version: legacy is not available for DCE version > 2.7.0"
        );
    }

    #[test]
    fn test_versioned_trait_gates() {
        let session = Fixed(v("2.7.14"));
        assert!(session.require_minimum("mode", "2.7.13").is_ok());
        assert!(session.require_minimum("future", "3.0.0").is_err());
        assert!(session.require_maximum("legacy", "2.7.0").is_err());
        assert!(session.require_maximum("current", "2.8.0").is_ok());
    }

    #[test]
    fn test_gate_with_invalid_boundary() {
        let session = Fixed(v("2.7.14"));
        assert!(session.require_minimum("mode", "not-a-version").is_err());
    }
}
