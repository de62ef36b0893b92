//! Sealed session envelope.
//!
//! Session state is stored as text. With a key configured it is wrapped in a
//! versioned envelope:
//!
//! ```text
//! v1:<nonce hex>:<tag hex>:<ciphertext hex>
//! ```
//!
//! Without a key the serialized state is stored as-is. Plain session JSON
//! always starts with `{`, so the two forms never collide.

use tracing::warn;

use crate::crypto::{SealKey, SealNonce, NONCE_LEN, TAG_LEN};
use crate::error::{CoreError, EnvelopeError, Result};

const SEPARATOR: char = ':';

/// Envelope format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeVersion {
    /// ChaCha20-Poly1305, Blake3-derived 256-bit key, hex components.
    V1,
}

impl EnvelopeVersion {
    /// The tag written in front of the envelope.
    pub const fn tag(self) -> &'static str {
        match self {
            EnvelopeVersion::V1 => "v1",
        }
    }

    fn parse(tag: &str) -> std::result::Result<Self, EnvelopeError> {
        match tag {
            "v1" => Ok(EnvelopeVersion::V1),
            other => Err(EnvelopeError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// A parsed ciphertext envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub version: EnvelopeVersion,
    pub nonce: SealNonce,
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encrypt plaintext under a fresh nonce.
    pub fn encrypt(plaintext: &[u8], key: &SealKey) -> Result<Self> {
        let nonce = SealNonce::generate();
        let (ciphertext, tag) = key.encrypt(plaintext, &nonce)?;

        Ok(Self {
            version: EnvelopeVersion::V1,
            nonce,
            tag,
            ciphertext,
        })
    }

    /// Decrypt and authenticate.
    pub fn decrypt(&self, key: &SealKey) -> Result<Vec<u8>> {
        match self.version {
            EnvelopeVersion::V1 => key.decrypt(&self.ciphertext, &self.tag, &self.nonce),
        }
    }

    /// Serialize to the stored text form.
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            self.version.tag(),
            hex::encode(self.nonce.as_bytes()),
            hex::encode(self.tag),
            hex::encode(&self.ciphertext),
            sep = SEPARATOR,
        )
    }

    /// Parse the stored text form. Every component must be present and of
    /// the exact length the version prescribes.
    pub fn parse(stored: &str) -> std::result::Result<Self, EnvelopeError> {
        let mut parts = stored.split(SEPARATOR);

        let version = parts
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(EnvelopeError::MissingComponent("version"))?;
        let version = EnvelopeVersion::parse(version)?;

        match version {
            EnvelopeVersion::V1 => {
                let nonce: [u8; NONCE_LEN] = fixed_component(parts.next(), "nonce")?;
                let tag: [u8; TAG_LEN] = fixed_component(parts.next(), "tag")?;
                let ciphertext = hex_component(parts.next(), "ciphertext")?;

                if parts.next().is_some() {
                    return Err(EnvelopeError::TrailingComponents);
                }

                Ok(Self {
                    version,
                    nonce: SealNonce::from_bytes(nonce),
                    tag,
                    ciphertext,
                })
            }
        }
    }

    /// Whether stored text is in envelope form (`v<digits>:`), regardless
    /// of whether the version is one we understand.
    pub fn is_sealed(stored: &str) -> bool {
        let Some((tag, _)) = stored.split_once(SEPARATOR) else {
            return false;
        };
        let mut chars = tag.chars();
        chars.next() == Some('v')
            && tag.len() > 1
            && chars.all(|c| c.is_ascii_digit())
    }
}

fn hex_component(
    part: Option<&str>,
    component: &'static str,
) -> std::result::Result<Vec<u8>, EnvelopeError> {
    let part = part.ok_or(EnvelopeError::MissingComponent(component))?;
    hex::decode(part).map_err(|_| EnvelopeError::InvalidHex { component })
}

fn fixed_component<const N: usize>(
    part: Option<&str>,
    component: &'static str,
) -> std::result::Result<[u8; N], EnvelopeError> {
    let part = part
        .filter(|p| !p.is_empty())
        .ok_or(EnvelopeError::MissingComponent(component))?;
    let bytes = hex::decode(part).map_err(|_| EnvelopeError::InvalidHex { component })?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| EnvelopeError::InvalidLength {
        component,
        expected: N,
        actual,
    })
}

/// Seal serialized state for storage.
///
/// Without a key the plaintext is returned unchanged.
pub fn seal(plaintext: &str, key: Option<&SealKey>) -> Result<String> {
    match key {
        Some(key) => Ok(Envelope::encrypt(plaintext.as_bytes(), key)?.encode()),
        None => Ok(plaintext.to_string()),
    }
}

/// Recover serialized state from storage.
///
/// Returns `None` for anything that cannot be authenticated and decoded:
/// tampered or truncated envelopes, unknown versions, a sealed blob with no
/// key configured, or an unsealed blob while a key is configured.
pub fn open(stored: &str, key: Option<&SealKey>) -> Option<String> {
    match (key, Envelope::is_sealed(stored)) {
        (Some(key), true) => match open_sealed(stored, key) {
            Ok(plaintext) => Some(plaintext),
            Err(e) => {
                warn!(error = %e, "discarding unreadable session envelope");
                None
            }
        },
        (Some(_), false) => {
            warn!("discarding unsealed session blob while encryption is enabled");
            None
        }
        (None, true) => {
            warn!("discarding sealed session blob: no encryption key configured");
            None
        }
        (None, false) => Some(stored.to_string()),
    }
}

fn open_sealed(stored: &str, key: &SealKey) -> Result<String> {
    let envelope = Envelope::parse(stored)?;
    let plaintext = envelope.decrypt(key)?;
    String::from_utf8(plaintext).map_err(|e| CoreError::DecodingError(e.to_string()))
}
