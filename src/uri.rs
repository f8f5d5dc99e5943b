//! Capture-source URIs.
//!
//! A [`Uri`] is a textual handle of the form `scheme://rest`, or a bare path
//! which implicitly selects the `file` scheme.

use ref_cast::RefCastCustom;
use ref_cast::ref_cast_custom;

/// Longest legal scheme prefix, in bytes (not counting the `://`).
pub const MAX_SCHEME_LEN: usize = 29;

/// A borrowed or owned capture-source locator.
///
/// `Uri` is a zero-cost wrapper over `str`: `Uri::ref_cast` lets callers
/// reinterpret a borrowed `&str` without allocating, the same way a borrowed
/// kernel header gets reinterpreted as `&Request` elsewhere in this
/// dependency stack.
#[derive(Debug, RefCastCustom, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Uri(str);

impl Uri {
    #[ref_cast_custom]
    pub(crate) fn ref_cast(s: &str) -> &Uri;

    /// Borrow a `str` as a `Uri`.
    pub fn new(s: &str) -> &Uri {
        Self::ref_cast(s)
    }

    /// The underlying text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits `scheme://rest` into `(scheme, rest)`, or returns `None` for a
    /// bare path (implicit `file` scheme).
    ///
    /// Mirrors `reader-scheme.c:uri2scheme`'s `strstr(uri, "://")` scan.
    pub fn scheme_prefix(&self) -> Result<Option<&str>, SchemeTooLong> {
        match self.0.find("://") {
            Some(idx) => {
                if idx > MAX_SCHEME_LEN {
                    Err(SchemeTooLong { len: idx })
                } else {
                    Ok(Some(&self.0[..idx]))
                }
            }
            None => Ok(None),
        }
    }
}

impl std::fmt::Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ToOwned for Uri {
    type Owned = OwnedUri;

    fn to_owned(&self) -> OwnedUri {
        OwnedUri(self.0.to_owned())
    }
}

/// An owned capture-source locator, for storage in long-lived structures
/// (`FileSlot`, `PendingItem`) that must outlive the borrow a caller passed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnedUri(String);

impl OwnedUri {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_uri(&self) -> &Uri {
        Uri::new(&self.0)
    }
}

impl std::fmt::Display for OwnedUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Uri> for OwnedUri {
    fn from(uri: &Uri) -> Self {
        uri.to_owned()
    }
}

impl From<String> for OwnedUri {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for OwnedUri {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The scheme prefix of a URI exceeded [`MAX_SCHEME_LEN`] bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemeTooLong {
    pub len: usize,
}

impl std::fmt::Display for SchemeTooLong {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scheme prefix too long for URI ({} > {} bytes)",
            self.len, MAX_SCHEME_LEN
        )
    }
}

impl std::error::Error for SchemeTooLong {}
