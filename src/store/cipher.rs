//! Encryption seam for token secrets persisted at rest.

// crates.io
use aes_gcm::{
	Aes256Gcm, Key, Nonce,
	aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::Rng;
// self
use crate::{_prelude::*, store::StoreError};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Opaque encrypt/decrypt pair applied to every token secret before it reaches storage.
pub trait TokenCipher
where
	Self: Send + Sync,
{
	/// Encrypts plaintext into a storable text value.
	fn encrypt(&self, plaintext: &str) -> Result<String, StoreError>;

	/// Reverses [`TokenCipher::encrypt`].
	fn decrypt(&self, ciphertext: &str) -> Result<String, StoreError>;
}

/// AES-256-GCM cipher producing `base64(nonce || ciphertext)`.
#[derive(Clone)]
pub struct AesGcmCipher {
	cipher: Aes256Gcm,
}
impl AesGcmCipher {
	/// Builds a cipher from raw key bytes.
	pub fn new(key: &[u8; KEY_LEN]) -> Self {
		Self { cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)) }
	}

	/// Builds a cipher from a base64-encoded 32-byte key.
	pub fn from_base64(key: &str) -> Result<Self, StoreError> {
		let bytes = BASE64.decode(key.trim()).map_err(|e| StoreError::Cipher {
			message: format!("Encryption key is not valid base64: {e}"),
		})?;
		let key = <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| StoreError::Cipher {
			message: format!("Encryption key must be {KEY_LEN} bytes, got {}", bytes.len()),
		})?;

		Ok(Self::new(&key))
	}

	/// Generates a fresh random key, base64-encoded.
	pub fn generate_key() -> String {
		let mut key = [0_u8; KEY_LEN];

		rand::rng().fill(&mut key);

		BASE64.encode(key)
	}
}
impl TokenCipher for AesGcmCipher {
	fn encrypt(&self, plaintext: &str) -> Result<String, StoreError> {
		let mut nonce = [0_u8; NONCE_LEN];

		rand::rng().fill(&mut nonce);

		let ciphertext = self
			.cipher
			.encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
			.map_err(|_| StoreError::Cipher { message: "Token encryption failed".into() })?;
		let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());

		combined.extend_from_slice(&nonce);
		combined.extend_from_slice(&ciphertext);

		Ok(BASE64.encode(combined))
	}

	fn decrypt(&self, ciphertext: &str) -> Result<String, StoreError> {
		let combined = BASE64.decode(ciphertext).map_err(|e| StoreError::Cipher {
			message: format!("Stored token is not valid base64: {e}"),
		})?;

		if combined.len() <= NONCE_LEN {
			return Err(StoreError::Cipher { message: "Stored token is truncated".into() });
		}

		let (nonce, payload) = combined.split_at(NONCE_LEN);
		let plaintext = self
			.cipher
			.decrypt(Nonce::from_slice(nonce), payload)
			.map_err(|_| StoreError::Cipher { message: "Token decryption failed".into() })?;

		String::from_utf8(plaintext).map_err(|e| StoreError::Cipher {
			message: format!("Decrypted token is not UTF-8: {e}"),
		})
	}
}
impl Debug for AesGcmCipher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("AesGcmCipher(..)")
	}
}
