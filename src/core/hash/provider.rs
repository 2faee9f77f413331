use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::digest::DynDigest;
use sha2::{Digest, Sha256, Sha512};

use crate::core::error::{PackError, PackResult};

/// Digest algorithms the index and metadata records may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFormat {
    Sha1,
    Sha256,
    Sha512,
    Md5,
}

impl HashFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            HashFormat::Sha1 => "sha1",
            HashFormat::Sha256 => "sha256",
            HashFormat::Sha512 => "sha512",
            HashFormat::Md5 => "md5",
        }
    }
}

impl fmt::Display for HashFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashFormat {
    type Err = PackError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sha1" => Ok(HashFormat::Sha1),
            "sha256" => Ok(HashFormat::Sha256),
            "sha512" => Ok(HashFormat::Sha512),
            "md5" => Ok(HashFormat::Md5),
            _ => Err(PackError::UnsupportedHashFormat(raw.to_string())),
        }
    }
}

/// Pluggable digest computation plus the canonical string form of a digest.
///
/// The index, the pack file and metadata records all go through a provider
/// so tests and alternative encodings can swap it out.
pub trait HashProvider: Send + Sync {
    fn new_digest(&self, format: HashFormat) -> Box<dyn DynDigest>;

    fn encode(&self, digest: &[u8]) -> String {
        hex::encode(digest)
    }

    fn hash_bytes(&self, format: HashFormat, bytes: &[u8]) -> String {
        let mut digest = self.new_digest(format);
        digest.update(bytes);
        self.encode(&digest.finalize())
    }

    /// Stream a file through the digest without loading it whole.
    fn hash_file(&self, format: HashFormat, path: &Path) -> PackResult<String> {
        let mut file = std::fs::File::open(path).map_err(|e| PackError::io(path, e))?;
        let mut digest = self.new_digest(format);
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let read = file.read(&mut buffer).map_err(|e| PackError::io(path, e))?;
            if read == 0 {
                break;
            }
            digest.update(&buffer[..read]);
        }
        Ok(self.encode(&digest.finalize()))
    }
}

/// Lowercase hex over the RustCrypto digests.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHashProvider;

impl HashProvider for DefaultHashProvider {
    fn new_digest(&self, format: HashFormat) -> Box<dyn DynDigest> {
        match format {
            HashFormat::Sha1 => Box::new(Sha1::new()),
            HashFormat::Sha256 => Box::new(Sha256::new()),
            HashFormat::Sha512 => Box::new(Sha512::new()),
            HashFormat::Md5 => Box::new(Md5::new()),
        }
    }
}
