use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Objects below this size are preferentially inlined into their parent
/// rather than split into a separate referenced object.
pub const OBJECT_MINIMUM_SIZE_BYTES: usize = 32 * 1024;

/// Hard upper bound on the size of a single stored object.
pub const OBJECT_MAXIMUM_SIZE_BYTES: usize = 128 * 1024;

/// Hard upper bound on the number of outgoing references a single object
/// may carry.
pub const OBJECT_MAXIMUM_DEGREE: usize = 1 << 16;

const DIGEST_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HashScheme {
    Sha256,
}

impl fmt::Display for HashScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashScheme::Sha256 => write!(f, "sha256"),
        }
    }
}

/// The format under which a [`Reference`] was minted: the hash scheme used
/// and the size/fan-out bounds its referent was produced under. Two
/// references with identical hashes but different formats are distinct,
/// since the format participates in how the referent must be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceFormat {
    pub hash_scheme: HashScheme,
    pub maximum_size_bytes: u32,
    pub maximum_degree: u32,
}

impl Default for ReferenceFormat {
    fn default() -> Self {
        Self {
            hash_scheme: HashScheme::Sha256,
            maximum_size_bytes: OBJECT_MAXIMUM_SIZE_BYTES as u32,
            maximum_degree: OBJECT_MAXIMUM_DEGREE as u32,
        }
    }
}

/// A content address for an immutable object in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference {
    format: ReferenceFormat,
    digest: [u8; DIGEST_LENGTH],
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceParseError {
    #[error("reference string is malformed: {0}")]
    Malformed(String),
    #[error("unsupported hash scheme {0:?}")]
    UnsupportedScheme(String),
}

impl Reference {
    /// Computes the reference a body and its outgoing-reference count
    /// would be stored under, given a format.
    pub fn of_contents(format: ReferenceFormat, body: &[u8], degree: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((degree as u64).to_le_bytes());
        hasher.update(body);
        let digest: [u8; DIGEST_LENGTH] = hasher.finalize().into();
        Self { format, digest }
    }

    pub fn format(&self) -> ReferenceFormat {
        self.format
    }

    pub fn digest_bytes(&self) -> &[u8; DIGEST_LENGTH] {
        &self.digest
    }

    /// The fixed-width byte encoding used as a RocksDB key: format fields
    /// followed by the raw digest.
    pub fn to_key_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 4 + 4 + DIGEST_LENGTH);
        out.push(match self.format.hash_scheme {
            HashScheme::Sha256 => 0u8,
        });
        out.extend_from_slice(&self.format.maximum_size_bytes.to_be_bytes());
        out.extend_from_slice(&self.format.maximum_degree.to_be_bytes());
        out.extend_from_slice(&self.digest);
        out
    }

    pub fn from_key_bytes(bytes: &[u8]) -> Result<Self, ReferenceParseError> {
        if bytes.len() != 1 + 4 + 4 + DIGEST_LENGTH {
            return Err(ReferenceParseError::Malformed(hex::encode(bytes)));
        }
        let hash_scheme = match bytes[0] {
            0 => HashScheme::Sha256,
            other => return Err(ReferenceParseError::UnsupportedScheme(other.to_string())),
        };
        let maximum_size_bytes = u32::from_be_bytes(bytes[1..5].try_into().unwrap());
        let maximum_degree = u32::from_be_bytes(bytes[5..9].try_into().unwrap());
        let mut digest = [0u8; DIGEST_LENGTH];
        digest.copy_from_slice(&bytes[9..9 + DIGEST_LENGTH]);
        Ok(Self {
            format: ReferenceFormat {
                hash_scheme,
                maximum_size_bytes,
                maximum_degree,
            },
            digest,
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.format.hash_scheme, hex::encode(self.digest))
    }
}

impl FromStr for Reference {
    type Err = ReferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, digest_hex) = s
            .split_once(':')
            .ok_or_else(|| ReferenceParseError::Malformed(s.to_owned()))?;
        let hash_scheme = match scheme {
            "sha256" => HashScheme::Sha256,
            other => return Err(ReferenceParseError::UnsupportedScheme(other.to_owned())),
        };
        let digest_vec =
            hex::decode(digest_hex).map_err(|_| ReferenceParseError::Malformed(s.to_owned()))?;
        if digest_vec.len() != DIGEST_LENGTH {
            return Err(ReferenceParseError::Malformed(s.to_owned()));
        }
        let mut digest = [0u8; DIGEST_LENGTH];
        digest.copy_from_slice(&digest_vec);
        Ok(Self {
            format: ReferenceFormat {
                hash_scheme,
                ..ReferenceFormat::default()
            },
            digest,
        })
    }
}
