//! Client-side key handling, simulated.
//!
//! The service never touches plaintext keys. Tests still need real key
//! material to check that what goes into the vault comes back unwrappable
//! by the right member, so this module does what a client would:
//!
//! - generate an X25519 key pair and encrypt the private half under a
//!   passphrase-derived key,
//! - generate a household content key,
//! - wrap the household key for a recipient's public key (ephemeral X25519
//!   agreement, BLAKE3 key derivation, ChaCha20-Poly1305),
//! - unwrap it again with the recipient's private key.
//!
//! All encodings are lowercase hex. The service treats them as opaque text.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey as DalekPublicKey, StaticSecret};

use hearthkey::KeySetup;
use hearthkey_core::{PublicKey, UserKeyRecord, WrappedKey};

const WRAP_CONTEXT: &str = "hearthkey-client-v1 household-key-wrap";
const PASSPHRASE_CONTEXT: &str = "hearthkey-client-v1 passphrase";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;

/// Errors from simulated client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("malformed encoding: {0}")]
    Encoding(String),

    #[error("decryption failed")]
    Decryption,
}

pub type Result<T> = std::result::Result<T, ClientError>;

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn decode_hex(encoded: &str) -> Result<Vec<u8>> {
    hex::decode(encoded).map_err(|e| ClientError::Encoding(e.to_string()))
}

fn to_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| ClientError::Encoding(format!("expected {N} bytes, got {}", bytes.len())))
}

fn derive_key(context: &str, parts: &[&[u8]]) -> [u8; KEY_LEN] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| ClientError::Decryption)?;
    let nonce: [u8; NONCE_LEN] = random_bytes();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| ClientError::Decryption)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn open(key: &[u8; KEY_LEN], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(ClientError::Encoding("sealed box too short".into()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| ClientError::Decryption)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| ClientError::Decryption)
}

/// A household content key, as a client holds it after unwrapping.
#[derive(Clone, PartialEq, Eq)]
pub struct HouseholdKey([u8; KEY_LEN]);

impl HouseholdKey {
    /// Generate a fresh content key.
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for HouseholdKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HouseholdKey(..)")
    }
}

/// A user's key pair as held on their device.
pub struct ClientKeys {
    secret: StaticSecret,
    public: DalekPublicKey,
}

impl ClientKeys {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        Self::from_secret_bytes(random_bytes())
    }

    /// Deterministic key pair from seed bytes.
    pub fn from_secret_bytes(bytes: [u8; KEY_LEN]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = DalekPublicKey::from(&secret);
        Self { secret, public }
    }

    /// The encoded public key, as published to the registry.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(hex::encode(self.public.as_bytes()))
    }

    /// Key material for registry setup: the private key sealed under a key
    /// derived from `passphrase` and a fresh salt.
    pub fn key_setup(&self, passphrase: &str) -> Result<KeySetup> {
        let salt: [u8; SALT_LEN] = random_bytes();
        let key = derive_key(PASSPHRASE_CONTEXT, &[passphrase.as_bytes(), &salt[..]]);
        let sealed = seal(&key, self.secret.as_bytes())?;
        Ok(KeySetup::new(
            self.public_key(),
            hex::encode(sealed),
            hex::encode(salt),
        ))
    }

    /// Recover a key pair on a new device from the stored record.
    pub fn recover(record: &UserKeyRecord, passphrase: &str) -> Result<Self> {
        let salt = decode_hex(record.salt.as_str())?;
        let sealed = decode_hex(record.encrypted_private_key.as_str())?;
        let key = derive_key(PASSPHRASE_CONTEXT, &[passphrase.as_bytes(), &salt[..]]);
        let secret = open(&key, &sealed)?;
        Ok(Self::from_secret_bytes(to_array(&secret)?))
    }

    /// Wrap the household key for the holder of `recipient`.
    ///
    /// Encoded as `ephemeral_public || nonce || ciphertext`.
    pub fn wrap_for(household_key: &HouseholdKey, recipient: &PublicKey) -> Result<WrappedKey> {
        let recipient_bytes = decode_hex(recipient.as_str())?;
        let recipient = DalekPublicKey::from(to_array::<KEY_LEN>(&recipient_bytes)?);

        let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
        let ephemeral_public = DalekPublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(&recipient);

        let key = derive_key(
            WRAP_CONTEXT,
            &[
                &shared.as_bytes()[..],
                &ephemeral_public.as_bytes()[..],
                &recipient.as_bytes()[..],
            ],
        );
        let sealed = seal(&key, household_key.as_bytes())?;

        let mut out = Vec::with_capacity(KEY_LEN + sealed.len());
        out.extend_from_slice(ephemeral_public.as_bytes());
        out.extend_from_slice(&sealed);
        Ok(WrappedKey::new(hex::encode(out)))
    }

    /// Unwrap a household key that was wrapped for this key pair.
    pub fn unwrap_key(&self, wrapped: &WrappedKey) -> Result<HouseholdKey> {
        let bytes = decode_hex(wrapped.as_str())?;
        if bytes.len() < KEY_LEN {
            return Err(ClientError::Encoding("wrapped key too short".into()));
        }
        let (ephemeral_public, sealed) = bytes.split_at(KEY_LEN);
        let ephemeral_public = DalekPublicKey::from(to_array::<KEY_LEN>(ephemeral_public)?);
        let shared = self.secret.diffie_hellman(&ephemeral_public);

        let key = derive_key(
            WRAP_CONTEXT,
            &[
                &shared.as_bytes()[..],
                &ephemeral_public.as_bytes()[..],
                &self.public.as_bytes()[..],
            ],
        );
        let plaintext = open(&key, sealed)?;
        Ok(HouseholdKey(to_array(&plaintext)?))
    }
}
