//! Embedded page payload: the contract between build output and the reader.
//!
//! ```json
//! { "v": 2, "s": "<base64 32B salt>", "n": "<base64 12B nonce>", "c": "<base64 ciphertext||16B tag>" }
//! ```
//!
//! Field names, the version number and the byte lengths are all part of the
//! contract; changing any of them requires a new `v`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::crypto::aead::{NONCE_LENGTH, TAG_LENGTH};
use crate::crypto::{Salt, SALT_LENGTH};
use crate::error::{Result, SealError};

/// Current payload version.
pub const PAYLOAD_VERSION: u8 = 2;

/// One encrypted block as embedded in a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Payload version
    pub v: u8,
    /// Post-level salt (base64), identical on every block of a post
    pub s: String,
    /// Per-block nonce (base64)
    pub n: String,
    /// Ciphertext with appended tag (base64)
    pub c: String,
}

/// Decoded binary view of a payload.
#[derive(Debug)]
pub struct PayloadParts {
    pub salt: Salt,
    pub nonce: [u8; NONCE_LENGTH],
    pub sealed: Vec<u8>,
}

impl EncryptedPayload {
    pub fn new(salt: &Salt, nonce: &[u8; NONCE_LENGTH], sealed: &[u8]) -> Self {
        Self {
            v: PAYLOAD_VERSION,
            s: salt.to_base64(),
            n: STANDARD.encode(nonce),
            c: STANDARD.encode(sealed),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode just the salt, for deriving the key.
    pub fn salt(&self) -> Result<Salt> {
        Salt::from_base64(&self.s).map_err(|e| SealError::InvalidPayload(e.to_string()))
    }

    /// Validate version and byte lengths and decode all fields.
    pub fn decode(&self) -> Result<PayloadParts> {
        if self.v != PAYLOAD_VERSION {
            return Err(SealError::InvalidPayload(format!(
                "Unsupported payload version {} (expected {})",
                self.v, PAYLOAD_VERSION
            )));
        }

        let salt = self.salt()?;

        let nonce_bytes = decode_field("n", &self.n)?;
        let nonce: [u8; NONCE_LENGTH] = nonce_bytes.as_slice().try_into().map_err(|_| {
            SealError::InvalidPayload(format!(
                "Nonce must be {} bytes, got {}",
                NONCE_LENGTH,
                nonce_bytes.len()
            ))
        })?;

        let sealed = decode_field("c", &self.c)?;
        if sealed.len() < TAG_LENGTH {
            return Err(SealError::InvalidPayload(format!(
                "Ciphertext shorter than the {}-byte tag",
                TAG_LENGTH
            )));
        }

        Ok(PayloadParts {
            salt,
            nonce,
            sealed,
        })
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value.as_bytes())
        .map_err(|e| SealError::InvalidPayload(format!("Field '{}' is not base64: {}", name, e)))
}

/// Which region of a post a block holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    /// Rendered post body
    Content,
    /// Table of contents
    Toc,
    /// Stylesheet generated for the post's math
    MathStyle,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Content => "content",
            BlockKind::Toc => "toc",
            BlockKind::MathStyle => "mathStyle",
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload tagged with the region it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub data: EncryptedPayload,
}

/// Everything the page needs to render a locked post. Holds no key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedPage {
    /// `collection:postId`
    pub key: String,
    pub hint: String,
    pub prompt: String,
    /// Post salt (base64), also repeated in every block
    pub salt: String,
    pub blocks: Vec<EncryptedBlock>,
}

impl ProtectedPage {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn block(&self, kind: BlockKind) -> Option<&EncryptedPayload> {
        self.blocks
            .iter()
            .find(|block| block.kind == kind)
            .map(|block| &block.data)
    }
}

/// Expected base64 length of a salt field, for quick sanity checks.
pub const SALT_BASE64_LENGTH: usize = (SALT_LENGTH + 2) / 3 * 4;
