//! Ed25519 flow signatures and the trust store
//!
//! A flow file is signed detached: the sidecar `<flow>.sig` is a JSON
//! document carrying the key id and a base64 Ed25519 signature over the raw
//! file bytes, never the parsed form. Verification resolves the public key
//! from a directory of PEM files named `<key_id>.pem` (the trust store).
//!
//! Strict mode (`REQUIRE_FLOW_SIGNATURE`) makes a missing or invalid
//! sidecar fail the flow load.

use crate::paths;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey,
};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use pkcs8::LineEnding;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SIGNATURE_VERSION: u32 = 1;
pub const SIGNATURE_ALGORITHM: &str = "ed25519";
pub const REQUIRE_FLOW_SIGNATURE_ENV_VAR: &str = "REQUIRE_FLOW_SIGNATURE";
pub const TRUSTED_KEYS_DIR_ENV_VAR: &str = "TRUSTED_FLOW_KEYS_DIR";

const TRUTHY_ENV_VALUES: [&str; 4] = ["1", "true", "yes", "on"];
const FALSY_ENV_VALUES: [&str; 5] = ["", "0", "false", "no", "off"];

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("signature missing for '{flow}': expected sidecar '{sidecar}'")]
    Missing { flow: PathBuf, sidecar: PathBuf },

    #[error("public key for key_id '{key_id}' is not trusted: expected '{expected}'")]
    UntrustedKey { key_id: String, expected: PathBuf },

    #[error("signature does not match '{flow}' (key_id '{key_id}')")]
    BadSignature { flow: PathBuf, key_id: String },

    #[error("malformed signature sidecar '{path}': {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("invalid key_id '{0}': use letters, digits, '.', '_' or '-' (1-64 chars)")]
    InvalidKeyId(String),

    #[error("invalid key material in '{path}': {reason}")]
    InvalidKey { path: PathBuf, reason: String },

    #[error("path for {label} must be a regular file, not a symlink: {path}")]
    NotARegularFile { label: String, path: PathBuf },

    #[error("file for {label} not found: {path}")]
    FileNotFound { label: String, path: PathBuf },

    #[error("refusing to overwrite existing file: {0} (pass --overwrite)")]
    AlreadyExists(PathBuf),

    #[error("environment variable '{var}' is invalid: '{value}' (accepted: 1/0, true/false, yes/no, on/off)")]
    InvalidEnvFlag { var: String, value: String },

    #[error("i/o failure at '{path}': {reason}")]
    Io { path: PathBuf, reason: String },
}

/// Sidecar document stored next to the flow file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSidecar {
    pub version: u32,
    pub algorithm: String,
    pub key_id: String,
    pub signature: String,
}

/// Outcome of a verification that did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified { key_id: String },
    /// No sidecar present; only possible when signatures are not required.
    Unsigned,
}

/// Parse the strict-mode flag value.
pub fn parse_signature_required(raw: Option<&str>) -> Result<bool, SignatureError> {
    let value = raw.unwrap_or("").trim().to_ascii_lowercase();
    if TRUTHY_ENV_VALUES.contains(&value.as_str()) {
        return Ok(true);
    }
    if FALSY_ENV_VALUES.contains(&value.as_str()) {
        return Ok(false);
    }
    Err(SignatureError::InvalidEnvFlag {
        var: REQUIRE_FLOW_SIGNATURE_ENV_VAR.to_string(),
        value,
    })
}

/// Strict-mode flag from the environment; fails fast on garbage values.
pub fn signature_required_from_env() -> Result<bool, SignatureError> {
    parse_signature_required(std::env::var(REQUIRE_FLOW_SIGNATURE_ENV_VAR).ok().as_deref())
}

/// Trust store directory: `TRUSTED_FLOW_KEYS_DIR` override or
/// `<home>/trusted_flow_keys`.
pub fn trusted_keys_dir_from_env(home: &Path) -> PathBuf {
    if let Ok(raw) = std::env::var(TRUSTED_KEYS_DIR_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    paths::trusted_keys_dir(home)
}

/// Validate and trim a key id.
pub fn normalize_key_id(raw: &str) -> Result<String, SignatureError> {
    let key_id = raw.trim();
    let mut chars = key_id.chars();
    let valid_first = matches!(chars.next(), Some(c) if c.is_ascii_alphanumeric());
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid_first || !valid_rest || key_id.len() > 64 {
        return Err(SignatureError::InvalidKeyId(raw.to_string()));
    }
    Ok(key_id.to_string())
}

/// Sidecar path for a flow file: `<flow>.sig` in the same directory.
pub fn sidecar_path(flow_path: &Path) -> PathBuf {
    let name = flow_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    flow_path.with_file_name(format!("{name}.sig"))
}

/// Generate an Ed25519 keypair: PKCS#8 PEM private key and SPKI PEM public
/// key, both written atomically with owner-only permissions.
pub fn generate_keypair(
    private_path: &Path,
    public_path: &Path,
    overwrite: bool,
) -> Result<(), SignatureError> {
    if private_path.exists() && !overwrite {
        return Err(SignatureError::AlreadyExists(private_path.to_path_buf()));
    }
    if public_path.exists() && !overwrite {
        return Err(SignatureError::AlreadyExists(public_path.to_path_buf()));
    }

    let signing_key = SigningKey::generate(&mut OsRng);
    let private_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|err| SignatureError::InvalidKey {
            path: private_path.to_path_buf(),
            reason: err.to_string(),
        })?;
    let public_pem = signing_key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|err| SignatureError::InvalidKey {
            path: public_path.to_path_buf(),
            reason: err.to_string(),
        })?;

    secure_write(private_path, private_pem.as_bytes())?;
    secure_write(public_path, public_pem.as_bytes())?;
    Ok(())
}

/// Sign a flow file, writing its sidecar. Returns the sidecar path.
pub fn sign_flow_file(
    flow_path: &Path,
    private_key_path: &Path,
    key_id: &str,
    overwrite: bool,
) -> Result<PathBuf, SignatureError> {
    ensure_regular_file(flow_path, "flow file")?;
    ensure_regular_file(private_key_path, "private key")?;

    let output_path = sidecar_path(flow_path);
    if output_path.exists() && !overwrite {
        return Err(SignatureError::AlreadyExists(output_path));
    }

    let key_id = normalize_key_id(key_id)?;
    let flow_bytes = read_bytes(flow_path)?;
    let private_pem = read_string(private_key_path)?;
    let signing_key =
        SigningKey::from_pkcs8_pem(&private_pem).map_err(|err| SignatureError::InvalidKey {
            path: private_key_path.to_path_buf(),
            reason: err.to_string(),
        })?;

    let signature = signing_key.sign(&flow_bytes);
    let sidecar = SignatureSidecar {
        version: SIGNATURE_VERSION,
        algorithm: SIGNATURE_ALGORITHM.to_string(),
        key_id,
        signature: BASE64.encode(signature.to_bytes()),
    };
    let payload = serde_json::to_vec_pretty(&sidecar).map_err(|err| SignatureError::Io {
        path: output_path.clone(),
        reason: err.to_string(),
    })?;
    secure_write(&output_path, &payload)?;
    Ok(output_path)
}

/// Install a public key into the trust store under `<key_id>.pem`.
///
/// The key is parsed before it is copied, so the store never holds bytes
/// that are not a valid Ed25519 public key.
pub fn trust_public_key(
    trusted_dir: &Path,
    public_key_path: &Path,
    key_id: &str,
    overwrite: bool,
) -> Result<PathBuf, SignatureError> {
    ensure_regular_file(public_key_path, "public key")?;
    let key_id = normalize_key_id(key_id)?;

    let pem = read_string(public_key_path)?;
    VerifyingKey::from_public_key_pem(&pem).map_err(|err| SignatureError::InvalidKey {
        path: public_key_path.to_path_buf(),
        reason: err.to_string(),
    })?;

    let destination = trusted_dir.join(format!("{key_id}.pem"));
    if destination.exists() && !overwrite {
        return Err(SignatureError::AlreadyExists(destination));
    }
    secure_write(&destination, pem.as_bytes())?;
    Ok(destination)
}

/// Parse and structurally validate a sidecar file.
pub fn load_sidecar(path: &Path) -> Result<SignatureSidecar, SignatureError> {
    let bytes = read_bytes(path)?;
    let malformed = |reason: &str| SignatureError::Malformed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let sidecar: SignatureSidecar =
        serde_json::from_slice(&bytes).map_err(|err| malformed(&format!("expected UTF-8 JSON ({err})")))?;

    if sidecar.version != SIGNATURE_VERSION {
        return Err(malformed(&format!(
            "unsupported version '{}', expected {SIGNATURE_VERSION}",
            sidecar.version
        )));
    }
    if sidecar.algorithm != SIGNATURE_ALGORITHM {
        return Err(malformed(&format!(
            "unsupported algorithm '{}', expected '{SIGNATURE_ALGORITHM}'",
            sidecar.algorithm
        )));
    }
    if sidecar.key_id.trim().is_empty() {
        return Err(malformed("missing 'key_id' field"));
    }
    if sidecar.signature.trim().is_empty() {
        return Err(malformed("missing 'signature' field"));
    }

    Ok(SignatureSidecar {
        key_id: normalize_key_id(&sidecar.key_id)?,
        signature: sidecar.signature.trim().to_string(),
        ..sidecar
    })
}

/// Verify `flow_bytes` against the sidecar next to `flow_path`.
///
/// Without a sidecar the result is `Unsigned` unless `require_signature` is
/// set, in which case the verification fails. The public key comes from
/// `explicit_public_key` when given, otherwise from the trust store.
pub fn verify_flow_file(
    flow_path: &Path,
    flow_bytes: &[u8],
    require_signature: bool,
    trusted_keys_dir: &Path,
    explicit_public_key: Option<&Path>,
) -> Result<VerifyOutcome, SignatureError> {
    let sidecar_file = sidecar_path(flow_path);
    if !sidecar_file.exists() {
        if require_signature {
            return Err(SignatureError::Missing {
                flow: flow_path.to_path_buf(),
                sidecar: sidecar_file,
            });
        }
        return Ok(VerifyOutcome::Unsigned);
    }
    ensure_regular_file(&sidecar_file, "signature sidecar")?;

    let sidecar = load_sidecar(&sidecar_file)?;
    let signature_bytes =
        BASE64
            .decode(sidecar.signature.as_bytes())
            .map_err(|_| SignatureError::Malformed {
                path: sidecar_file.clone(),
                reason: "'signature' field is not valid base64".to_string(),
            })?;
    let signature =
        Signature::from_slice(&signature_bytes).map_err(|_| SignatureError::Malformed {
            path: sidecar_file.clone(),
            reason: "'signature' field is not a valid Ed25519 signature".to_string(),
        })?;

    let key_path = match explicit_public_key {
        Some(path) => path.to_path_buf(),
        None => {
            let trusted = trusted_keys_dir.join(format!("{}.pem", sidecar.key_id));
            if !trusted.exists() {
                return Err(SignatureError::UntrustedKey {
                    key_id: sidecar.key_id,
                    expected: trusted,
                });
            }
            trusted
        }
    };
    ensure_regular_file(&key_path, "public key")?;

    let pem = read_string(&key_path)?;
    let verifying_key =
        VerifyingKey::from_public_key_pem(&pem).map_err(|err| SignatureError::InvalidKey {
            path: key_path.clone(),
            reason: err.to_string(),
        })?;

    verifying_key
        .verify_strict(flow_bytes, &signature)
        .map_err(|_| SignatureError::BadSignature {
            flow: flow_path.to_path_buf(),
            key_id: sidecar.key_id.clone(),
        })?;

    Ok(VerifyOutcome::Verified {
        key_id: sidecar.key_id,
    })
}

fn ensure_regular_file(path: &Path, label: &str) -> Result<(), SignatureError> {
    if !path.exists() {
        return Err(SignatureError::FileNotFound {
            label: label.to_string(),
            path: path.to_path_buf(),
        });
    }
    let is_symlink = path
        .symlink_metadata()
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false);
    if is_symlink || !path.is_file() {
        return Err(SignatureError::NotARegularFile {
            label: label.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, SignatureError> {
    std::fs::read(path).map_err(|err| SignatureError::Io {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

fn read_string(path: &Path) -> Result<String, SignatureError> {
    std::fs::read_to_string(path).map_err(|err| SignatureError::Io {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

fn secure_write(path: &Path, payload: &[u8]) -> Result<(), SignatureError> {
    paths::secure_write_bytes(path, payload).map_err(|err| SignatureError::Io {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}
