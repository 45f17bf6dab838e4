//! Ed25519 attestors and attestations over bundle hashes.
//!
//! An [`Attestor`] owns a signing key and an identity string. Its public
//! counterpart, [`AttestorIdentity`], is what auditors are configured with.
//! Keys are always passed in explicitly; nothing in this crate holds a
//! process-wide key.
//!
//! # Key files
//!
//! ```text
//! attestor.json      {"id":"sim","algorithm":"ed25519","secretKey":"<64 hex>"}
//! attestor.pub.json  {"id":"sim","algorithm":"ed25519","publicKey":"<64 hex>"}
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hash::{Hash, hash_to_hex};
use crate::clock::{Clock, SystemClock};
use crate::determinism::{AtomicWriteError, write_atomic};

/// Size of an Ed25519 secret or public key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Algorithm label written into every attestation.
pub const ATTESTATION_ALGORITHM: &str = "ed25519-blake3-cac-json-v1";

/// Errors from loading, saving or decoding attestor keys and signatures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttestorError {
    /// A key file could not be read.
    #[error("cannot read key file {}: {source}", path.display())]
    Io {
        /// The key file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A key file was not valid JSON for the expected record.
    #[error("cannot parse key file {}: {source}", path.display())]
    Parse {
        /// The key file path.
        path: PathBuf,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Key material was malformed.
    #[error("invalid key material: {reason}")]
    InvalidKey {
        /// Why the key was rejected.
        reason: String,
    },

    /// A signature was malformed.
    #[error("invalid signature encoding: {reason}")]
    InvalidSignature {
        /// Why the signature was rejected.
        reason: String,
    },

    /// Writing a key file failed.
    #[error("cannot write key file: {0}")]
    Write(#[from] AtomicWriteError),

    /// Serializing a key record failed.
    #[error("cannot encode key record: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Signature algorithms an attestor key may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    /// Ed25519 (RFC 8032).
    #[default]
    Ed25519,
}

/// A cryptographic signature over a bundle hash, bound to a named signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    /// Attestor id of the signer.
    pub signer: String,
    /// Hex-encoded Ed25519 signature over the raw 32 hash bytes.
    pub signature: String,
    /// Hex-encoded bundle hash the signer attested to.
    pub hash: String,
    /// Algorithm label, [`ATTESTATION_ALGORITHM`] for this crate.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Signing time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub signed_at: u64,
}

fn default_algorithm() -> String {
    ATTESTATION_ALGORITHM.to_string()
}

/// Holder of an attestor id and its Ed25519 signing key.
#[derive(Clone)]
pub struct Attestor {
    id: String,
    algorithm: KeyAlgorithm,
    signing_key: SigningKey,
}

impl fmt::Debug for Attestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attestor")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("public_key", &hex::encode(self.signing_key.verifying_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

impl Attestor {
    /// Wraps an existing signing key.
    #[must_use]
    pub fn new(id: impl Into<String>, signing_key: SigningKey) -> Self {
        Self {
            id: id.into(),
            algorithm: KeyAlgorithm::Ed25519,
            signing_key,
        }
    }

    /// Builds an attestor from a fixed 32-byte seed.
    #[must_use]
    pub fn from_seed(id: impl Into<String>, seed: [u8; KEY_SIZE]) -> Self {
        Self::new(id, SigningKey::from_bytes(&seed))
    }

    /// Generates a fresh attestor key from the OS RNG.
    #[must_use]
    pub fn generate(id: impl Into<String>) -> Self {
        Self::new(id, SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Returns the attestor id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the public identity used by auditors.
    #[must_use]
    pub fn identity(&self) -> AttestorIdentity {
        AttestorIdentity {
            id: self.id.clone(),
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Signs `content_hash`, stamping the attestation with the system time.
    #[must_use]
    pub fn sign(&self, content_hash: &Hash) -> Attestation {
        self.sign_with_clock(content_hash, &SystemClock)
    }

    /// Signs `content_hash`, stamping the attestation with `clock`.
    #[must_use]
    pub fn sign_with_clock(&self, content_hash: &Hash, clock: &dyn Clock) -> Attestation {
        let signature = self.signing_key.sign(content_hash);
        Attestation {
            signer: self.id.clone(),
            signature: hex::encode(signature.to_bytes()),
            hash: hash_to_hex(content_hash),
            algorithm: ATTESTATION_ALGORITHM.to_string(),
            signed_at: clock.now_millis(),
        }
    }

    /// Loads an attestor from a JSON key file.
    ///
    /// # Errors
    ///
    /// Returns [`AttestorError`] if the file cannot be read, parsed, or holds
    /// malformed key material.
    pub fn load(path: &Path) -> Result<Self, AttestorError> {
        let record: SecretKeyRecord = read_record(path)?;
        let seed = decode_key(&record.secret_key)?;
        Ok(Self {
            id: record.id,
            algorithm: record.algorithm,
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Writes the secret key file to `path` and the public identity file
    /// next to it, returning the identity file path.
    ///
    /// Both files are written atomically through a `NamedTempFile`, which
    /// is created with mode 0600 on Unix.
    ///
    /// # Errors
    ///
    /// Returns [`AttestorError::Write`] if either file cannot be written.
    pub fn save(&self, path: &Path) -> Result<PathBuf, AttestorError> {
        let record = SecretKeyRecord {
            id: self.id.clone(),
            algorithm: self.algorithm,
            secret_key: hex::encode(self.signing_key.to_bytes()),
        };
        let bytes = serde_json::to_vec_pretty(&record).map_err(AttestorError::Encode)?;
        write_atomic(path, &bytes)?;

        let public_path = identity_path_for(path);
        self.identity().save(&public_path)?;
        Ok(public_path)
    }
}

/// Public identity of an attestor: its id and verifying key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PublicKeyRecord", into = "PublicKeyRecord")]
pub struct AttestorIdentity {
    id: String,
    verifying_key: VerifyingKey,
}

impl AttestorIdentity {
    /// Builds an identity from an id and raw public key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AttestorError::InvalidKey`] if the bytes are not a valid
    /// Ed25519 point.
    pub fn from_public_key(
        id: impl Into<String>,
        public_key: &[u8; KEY_SIZE],
    ) -> Result<Self, AttestorError> {
        let verifying_key =
            VerifyingKey::from_bytes(public_key).map_err(|e| AttestorError::InvalidKey {
                reason: e.to_string(),
            })?;
        Ok(Self {
            id: id.into(),
            verifying_key,
        })
    }

    /// Returns the attestor id this identity speaks for.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the Ed25519 verifying key.
    #[must_use]
    pub const fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Loads an identity from a JSON public key file.
    ///
    /// # Errors
    ///
    /// Returns [`AttestorError`] if the file cannot be read, parsed, or holds
    /// malformed key material.
    pub fn load(path: &Path) -> Result<Self, AttestorError> {
        let record: PublicKeyRecord = read_record(path)?;
        Self::try_from(record)
    }

    /// Writes this identity as a JSON public key file.
    ///
    /// # Errors
    ///
    /// Returns [`AttestorError::Write`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), AttestorError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(AttestorError::Encode)?;
        write_atomic(path, &bytes)?;
        Ok(())
    }
}

/// Decodes a hex signature into an Ed25519 signature.
///
/// # Errors
///
/// Returns [`AttestorError::InvalidSignature`] if the input is not hex or not
/// [`SIGNATURE_SIZE`] bytes.
pub fn parse_signature(encoded: &str) -> Result<ed25519_dalek::Signature, AttestorError> {
    let bytes = hex::decode(encoded).map_err(|e| AttestorError::InvalidSignature {
        reason: e.to_string(),
    })?;
    ed25519_dalek::Signature::from_slice(&bytes).map_err(|_| AttestorError::InvalidSignature {
        reason: format!("expected {SIGNATURE_SIZE} bytes, got {}", bytes.len()),
    })
}

/// Path of the public identity file written next to a secret key file:
/// `keys/sim.json` becomes `keys/sim.pub.json`.
#[must_use]
pub fn identity_path_for(secret_path: &Path) -> PathBuf {
    let stem = secret_path
        .file_stem()
        .map_or_else(|| "attestor".into(), |s| s.to_string_lossy().into_owned());
    secret_path.with_file_name(format!("{stem}.pub.json"))
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SecretKeyRecord {
    id: String,
    #[serde(default)]
    algorithm: KeyAlgorithm,
    secret_key: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PublicKeyRecord {
    id: String,
    #[serde(default)]
    algorithm: KeyAlgorithm,
    public_key: String,
}

impl TryFrom<PublicKeyRecord> for AttestorIdentity {
    type Error = AttestorError;

    fn try_from(record: PublicKeyRecord) -> Result<Self, Self::Error> {
        let bytes = decode_key(&record.public_key)?;
        Self::from_public_key(record.id, &bytes)
    }
}

impl From<AttestorIdentity> for PublicKeyRecord {
    fn from(identity: AttestorIdentity) -> Self {
        Self {
            id: identity.id,
            algorithm: KeyAlgorithm::Ed25519,
            public_key: hex::encode(identity.verifying_key.as_bytes()),
        }
    }
}

fn decode_key(encoded: &str) -> Result<[u8; KEY_SIZE], AttestorError> {
    let bytes = hex::decode(encoded.trim()).map_err(|e| AttestorError::InvalidKey {
        reason: e.to_string(),
    })?;
    <[u8; KEY_SIZE]>::try_from(bytes.as_slice()).map_err(|_| AttestorError::InvalidKey {
        reason: format!("expected {KEY_SIZE} bytes, got {}", bytes.len()),
    })
}

fn read_record<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AttestorError> {
    let content = std::fs::read_to_string(path).map_err(|source| AttestorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| AttestorError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
