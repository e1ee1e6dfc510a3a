use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::crypto::base58;
use crate::types::CodecError;

/// One-shot wallet secret in the ledger's canonical 64-byte layout:
/// 32-byte private seed followed by the 32-byte public key.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; 64]);

impl SecretKey {
    /// Generates a fresh keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(&signing)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() != 64 {
            return Err(CodecError::InvalidSecretKeyLength(bytes.len()));
        }
        let mut out = [0u8; 64];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    fn from_signing_key(signing: &SigningKey) -> Self {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&signing.to_bytes());
        out[32..].copy_from_slice(&signing.verifying_key().to_bytes());
        Self(out)
    }

    pub fn seed(&self) -> [u8; 32] {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&self.0[..32]);
        seed
    }

    pub fn public_key(&self) -> [u8; 32] {
        let mut public = [0u8; 32];
        public.copy_from_slice(&self.0[32..]);
        public
    }

    /// Base-58 rendering of the public key.
    pub fn address(&self) -> String {
        base58::encode_address(&self.public_key())
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.0
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.seed())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key().verifying_key()
    }
}
