//! Archive integrity checks.
//!
//! A formula pins its source archive with an expected digest. The fetched bytes
//! are hashed and compared against it before anything is unpacked; a mismatch
//! is fatal and never retried.
//!
//! # Examples
//!
//! ```
//! use brewsmith::checksum::Checksum;
//!
//! let expected: Checksum =
//!     "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
//!         .parse()
//!         .unwrap();
//! assert!(expected.verify(b"hello").is_ok());
//! assert!(expected.verify(b"hellO").is_err());
//! ```

use crate::error::{Error, Result};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

/// Digest algorithms a formula may pin its archive with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha256,
    Sha512,
}

impl Algorithm {
    /// Length of the hex-encoded digest
    pub fn hex_len(self) -> usize {
        match self {
            Algorithm::Sha256 => 64,
            Algorithm::Sha512 => 128,
        }
    }

    /// Hash `bytes` and return the lowercase hex digest
    pub fn digest(self, bytes: &[u8]) -> String {
        match self {
            Algorithm::Sha256 => format!("{:x}", Sha256::digest(bytes)),
            Algorithm::Sha512 => format!("{:x}", Sha512::digest(bytes)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
        }
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Algorithm::Sha256),
            "sha512" => Ok(Algorithm::Sha512),
            other => Err(format!("unsupported checksum algorithm '{}'", other)),
        }
    }
}

/// Expected digest of a source archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    algorithm: Algorithm,
    hex: String,
}

impl Checksum {
    /// Build a checksum from an algorithm and hex digest.
    ///
    /// The digest is normalized to lowercase; its length must match the algorithm.
    pub fn new(algorithm: Algorithm, hex: &str) -> std::result::Result<Self, String> {
        let hex = hex.trim();
        if hex.is_empty() {
            return Err("checksum is empty".to_string());
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("checksum '{}' is not hexadecimal", hex));
        }
        if hex.len() != algorithm.hex_len() {
            return Err(format!(
                "{} checksum must be {} hex digits, got {}",
                algorithm.name(),
                algorithm.hex_len(),
                hex.len()
            ));
        }
        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Compare the digest of `bytes` against this checksum
    pub fn verify(&self, bytes: &[u8]) -> Result<()> {
        let actual = self.algorithm.digest(bytes);
        if actual.eq_ignore_ascii_case(&self.hex) {
            tracing::debug!("{} verified ({} bytes)", self, bytes.len());
            Ok(())
        } else {
            Err(Error::Integrity {
                expected: self.to_string(),
                actual: format!("{}:{}", self.algorithm.name(), actual),
            })
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.name(), self.hex)
    }
}

/// Parses `<algorithm>:<hex>`, or a bare hex string as sha256
impl FromStr for Checksum {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((algorithm, hex)) => Checksum::new(algorithm.trim().parse()?, hex),
            None => Checksum::new(Algorithm::Sha256, s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_verify_matches() {
        let checksum = Checksum::new(Algorithm::Sha256, HELLO_SHA256).unwrap();
        assert!(checksum.verify(b"hello").is_ok());
    }

    #[test]
    fn test_verify_is_case_insensitive() {
        let upper = HELLO_SHA256.to_ascii_uppercase();
        let checksum = Checksum::new(Algorithm::Sha256, &upper).unwrap();
        assert_eq!(checksum.hex(), HELLO_SHA256);
        assert!(checksum.verify(b"hello").is_ok());
    }

    #[test]
    fn test_single_bit_flip_is_detected() {
        let data = b"git-secrets source archive".to_vec();
        let checksum = Checksum::new(Algorithm::Sha256, &Algorithm::Sha256.digest(&data)).unwrap();
        assert!(checksum.verify(&data).is_ok());

        for byte in 0..data.len() {
            for bit in 0..8 {
                let mut mutated = data.clone();
                mutated[byte] ^= 1 << bit;
                match checksum.verify(&mutated) {
                    Err(Error::Integrity { expected, actual }) => assert_ne!(expected, actual),
                    other => panic!("expected integrity error, got {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_sha512() {
        let hex = Algorithm::Sha512.digest(b"hello");
        assert_eq!(hex.len(), 128);
        let checksum: Checksum = format!("sha512:{}", hex).parse().unwrap();
        assert_eq!(checksum.algorithm(), Algorithm::Sha512);
        assert!(checksum.verify(b"hello").is_ok());
        assert!(checksum.verify(b"world").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("".parse::<Checksum>().is_err());
        assert!("sha256:".parse::<Checksum>().is_err());
        assert!("md5:d41d8cd98f00b204e9800998ecf8427e".parse::<Checksum>().is_err());
        assert!("sha256:abc".parse::<Checksum>().is_err());
        assert!(format!("sha256:{}", "z".repeat(64)).parse::<Checksum>().is_err());
    }

    #[test]
    fn test_bare_hex_is_sha256() {
        let checksum: Checksum = HELLO_SHA256.parse().unwrap();
        assert_eq!(checksum.algorithm(), Algorithm::Sha256);
        assert_eq!(checksum.to_string(), format!("sha256:{}", HELLO_SHA256));
    }
}
