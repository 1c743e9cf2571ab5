//! Hash algorithm and length configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hash::error::{HashError, HashResult};

/// shortest hash prefix we allow
pub const MIN_HASH_LENGTH: usize = 10;

/// default truncation length
pub const DEFAULT_HASH_LENGTH: usize = 16;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Md5,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Md5 => "md5",
        }
    }

    /// Length of the full hex digest.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha384 => 96,
            Self::Md5 => 32,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "sha384" | "sha-384" => Ok(Self::Sha384),
            "md5" | "md-5" => Ok(Self::Md5),
            other => Err(HashError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Algorithm plus truncation length.
///
/// The length is validated on construction so a `HashConfig` in hand is
/// always usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashConfig {
    algorithm: HashAlgorithm,
    length: usize,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            length: DEFAULT_HASH_LENGTH,
        }
    }
}

impl HashConfig {
    /// Create a validated config.
    pub fn new(algorithm: HashAlgorithm, length: usize) -> HashResult<Self> {
        let max = algorithm.hex_len();
        if !(MIN_HASH_LENGTH..=max).contains(&length) {
            return Err(HashError::InvalidLength {
                algorithm: algorithm.to_string(),
                length,
                min: MIN_HASH_LENGTH,
                max,
            });
        }
        Ok(Self { algorithm, length })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HashConfig::default();
        assert_eq!(config.algorithm(), HashAlgorithm::Sha256);
        assert_eq!(config.length(), 16);
    }

    #[test]
    fn test_length_bounds() {
        assert!(HashConfig::new(HashAlgorithm::Sha256, 10).is_ok());
        assert!(HashConfig::new(HashAlgorithm::Sha256, 64).is_ok());
        assert!(HashConfig::new(HashAlgorithm::Sha256, 65).is_err());
        assert!(HashConfig::new(HashAlgorithm::Sha256, 9).is_err());
        assert!(HashConfig::new(HashAlgorithm::Sha384, 96).is_ok());
        assert!(HashConfig::new(HashAlgorithm::Md5, 32).is_ok());
        assert!(HashConfig::new(HashAlgorithm::Md5, 33).is_err());
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("SHA256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("sha-384".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha384);
        assert_eq!("MD5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert_eq!(HashAlgorithm::Md5.to_string(), "md5");
        assert!(matches!(
            "md4".parse::<HashAlgorithm>(),
            Err(HashError::UnknownAlgorithm(_))
        ));
    }
}
