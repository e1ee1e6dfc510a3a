//! Key custody and address encoding.
//!
//! Auditor notes:
//! - Ed25519 via ed25519-dalek only; no custom curve arithmetic.
//! - Secrets are wrapped in a zeroize-on-drop newtype.

mod base58;
mod keys;

pub use base58::{decode, decode_address, encode, encode_address};
pub use keys::SecretKey;
