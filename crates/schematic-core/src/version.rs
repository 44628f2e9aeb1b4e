//! Game version encoding.
//!
//! A version is four 16-bit components packed big-endian into a `u64`:
//! `major << 48 | minor << 32 | patch << 16 | build`.

use serde::{Deserialize, Serialize};

/// A four-part game version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub build: u16,
}

/// Version stamped on blueprints created by this crate.
pub const DEFAULT_VERSION: Version = Version::new(1, 1, 110, 0);

impl Version {
    pub const fn new(major: u16, minor: u16, patch: u16, build: u16) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    pub fn encode(self) -> u64 {
        encode_version(self.major, self.minor, self.patch, self.build)
    }

    pub fn decode(value: u64) -> Self {
        let (major, minor, patch, build) = decode_version(value);
        Self::new(major, minor, patch, build)
    }
}

impl Default for Version {
    fn default() -> Self {
        DEFAULT_VERSION
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Version::decode(value)
    }
}

impl From<Version> for u64 {
    fn from(v: Version) -> u64 {
        v.encode()
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.build)
    }
}

/// Pack four 16-bit components into one `u64`, most significant first.
pub fn encode_version(major: u16, minor: u16, patch: u16, build: u16) -> u64 {
    (major as u64) << 48 | (minor as u64) << 32 | (patch as u64) << 16 | build as u64
}

/// Inverse of [`encode_version`].
pub fn decode_version(value: u64) -> (u16, u16, u16, u16) {
    (
        (value >> 48) as u16,
        (value >> 32) as u16,
        (value >> 16) as u16,
        value as u16,
    )
}
