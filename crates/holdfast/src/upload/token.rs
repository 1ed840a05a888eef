/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Signed upload tokens.
//!
//! A token is `<claims>.<signature>`, both segments base64url without
//! padding. The claims are JSON naming the owner, the upload correlation id,
//! the slot kind and an expiry; the signature is Ed25519 over the encoded
//! claims segment. The upload service checks tokens offline against the
//! public key the API publishes, so nothing about a token is stored.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::SlotKind;

/// PEM tag for Ed25519 public keys.
const ED25519_PEM_TAG: &str = "PUBLIC KEY";

/// ASN.1 DER prefix of an Ed25519 SubjectPublicKeyInfo.
const ED25519_DER_PREFIX: [u8; 12] = [
    0x30, 0x2a, // SEQUENCE, 42 bytes
    0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
    0x06, 0x03, // OID, 3 bytes
    0x2b, 0x65, 0x70, // 1.3.101.112 (Ed25519)
    0x03, 0x21, // BIT STRING, 33 bytes
    0x00, // unused bits
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Token lifetime must be positive and representable")]
    InvalidTtl,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token signature does not verify")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,
}

/// What an upload token grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTokenClaims {
    pub owner_id: String,
    pub correlation_id: String,
    pub kind: SlotKind,
    /// Unix timestamp in seconds.
    pub expires_at: i64,
}

/// Issues upload tokens with an Ed25519 private key.
#[derive(Clone)]
pub struct TokenSigner {
    key: SigningKey,
    ttl: chrono::Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("public_key", &STANDARD.encode(self.key.verifying_key().to_bytes()))
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenSigner {
    /// Creates a signer with a freshly generated key.
    pub fn generate(ttl: Duration) -> Result<Self, TokenError> {
        let key = SigningKey::generate(&mut rand::thread_rng());
        Self::new(key, ttl)
    }

    /// Loads a signer from a base64 encoded 32-byte private key seed.
    pub fn from_seed_base64(seed: &str, ttl: Duration) -> Result<Self, TokenError> {
        let bytes = STANDARD
            .decode(seed.trim())
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            TokenError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Self::new(SigningKey::from_bytes(&seed), ttl)
    }

    fn new(key: SigningKey, ttl: Duration) -> Result<Self, TokenError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| TokenError::InvalidTtl)?;
        if ttl <= chrono::Duration::zero() {
            return Err(TokenError::InvalidTtl);
        }
        Ok(Self { key, ttl })
    }

    /// The private key seed, base64 encoded. Suitable for configuration.
    pub fn seed_base64(&self) -> String {
        STANDARD.encode(self.key.to_bytes())
    }

    pub fn verifier(&self) -> TokenVerifier {
        TokenVerifier {
            key: self.key.verifying_key(),
        }
    }

    /// Issues a token for one upload slot, valid from `now` for the
    /// configured lifetime.
    pub fn issue(
        &self,
        owner_id: &str,
        correlation_id: &str,
        kind: SlotKind,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::InvalidTtl)?;
        self.sign(&UploadTokenClaims {
            owner_id: owner_id.to_string(),
            correlation_id: correlation_id.to_string(),
            kind,
            expires_at: expires_at.timestamp(),
        })
    }

    fn sign(&self, claims: &UploadTokenClaims) -> Result<String, TokenError> {
        let json = serde_json::to_vec(claims).map_err(|e| TokenError::Malformed(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.key.sign(payload.as_bytes());
        Ok(format!(
            "{}.{}",
            payload,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}

/// Checks upload tokens against an Ed25519 public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenVerifier {
    key: VerifyingKey,
}

impl TokenVerifier {
    /// Loads a verifier from a PEM encoded SubjectPublicKeyInfo.
    pub fn from_public_key_pem(pem_str: &str) -> Result<Self, TokenError> {
        let pem = pem::parse(pem_str).map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        if pem.tag() != ED25519_PEM_TAG {
            return Err(TokenError::InvalidKey(format!(
                "expected tag '{}', got '{}'",
                ED25519_PEM_TAG,
                pem.tag()
            )));
        }

        let key = pem
            .contents()
            .strip_prefix(&ED25519_DER_PREFIX[..])
            .and_then(|raw| <[u8; 32]>::try_from(raw).ok())
            .ok_or_else(|| TokenError::InvalidKey("not an Ed25519 public key".to_string()))?;
        let key =
            VerifyingKey::from_bytes(&key).map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        Ok(Self { key })
    }

    pub fn public_key_pem(&self) -> String {
        let mut der = Vec::with_capacity(ED25519_DER_PREFIX.len() + 32);
        der.extend_from_slice(&ED25519_DER_PREFIX);
        der.extend_from_slice(self.key.as_bytes());
        pem::encode(&pem::Pem::new(ED25519_PEM_TAG, der))
    }

    /// Returns the claims of a token signed by the matching key that has
    /// not expired at `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<UploadTokenClaims, TokenError> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| TokenError::Malformed("missing signature segment".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| TokenError::Malformed(format!("signature: {}", e)))?;
        let signature =
            Signature::from_slice(&signature).map_err(|_| TokenError::InvalidSignature)?;
        self.key
            .verify(payload.as_bytes(), &signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| TokenError::Malformed(format!("claims: {}", e)))?;
        let claims: UploadTokenClaims = serde_json::from_slice(&json)
            .map_err(|e| TokenError::Malformed(format!("claims: {}", e)))?;

        if claims.expires_at <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
