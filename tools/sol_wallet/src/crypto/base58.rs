//! Base-58 codec for addresses, blockhashes and signatures.
//!
//! The byte-level behavior (leading 0x00 bytes map to leading '1's) is part
//! of the address contract, so the codec lives in-crate and is pinned by
//! unit tests rather than delegated.

use crate::types::CodecError;

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

pub fn encode(bytes: &[u8]) -> String {
    let zeros = bytes.iter().take_while(|&&byte| byte == 0).count();

    let mut digits: Vec<u8> = Vec::new();
    for &byte in &bytes[zeros..] {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut out = String::with_capacity(zeros + digits.len());
    for _ in 0..zeros {
        out.push(ALPHABET[0] as char);
    }
    for &digit in digits.iter().rev() {
        out.push(ALPHABET[digit as usize] as char);
    }
    out
}

pub fn decode(value: &str) -> Result<Vec<u8>, CodecError> {
    let mut bytes: Vec<u8> = Vec::new();
    for ch in value.chars() {
        let index = ALPHABET
            .iter()
            .position(|&symbol| symbol as char == ch)
            .ok_or(CodecError::InvalidBase58Character(ch))? as u32;
        let mut carry = index;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    for ch in value.chars() {
        if ch != ALPHABET[0] as char {
            break;
        }
        bytes.push(0);
    }
    bytes.reverse();
    Ok(bytes)
}

pub fn encode_address(bytes: &[u8; 32]) -> String {
    encode(bytes)
}

pub fn decode_address(value: &str) -> Result<[u8; 32], CodecError> {
    let bytes = decode(value)?;
    if bytes.len() != 32 {
        return Err(CodecError::InvalidAddressLength(bytes.len()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}
