//! Minimal ABI plumbing for the fixed set of read-only calls the tracker
//! makes. Hand-rolled selectors and 32-byte word decoding keep the full
//! contract ABI surface out of the crate.

use crate::errors::ChainError;
use alloy_primitives::{hex, Address, I256, U256};

// Function selectors (keccak-256 of the canonical signature, first 4 bytes)
pub const SEL_SYMBOL: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];
pub const SEL_NAME: [u8; 4] = [0x06, 0xfd, 0xde, 0x03];
pub const SEL_DECIMALS: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
pub const SEL_BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
pub const SEL_SLOT0: [u8; 4] = [0x38, 0x50, 0xc7, 0xbd];
pub const SEL_LIQUIDITY: [u8; 4] = [0x1a, 0x68, 0x65, 0x02];
pub const SEL_FEE: [u8; 4] = [0xdd, 0xca, 0x3f, 0x43];
pub const SEL_TICK_SPACING: [u8; 4] = [0xd0, 0xc9, 0x3a, 0x7c];
pub const SEL_TOKEN0: [u8; 4] = [0x0d, 0xfe, 0x16, 0x81];
pub const SEL_TOKEN1: [u8; 4] = [0xd2, 0x12, 0x20, 0xa7];
pub const SEL_POSITIONS: [u8; 4] = [0x99, 0xfb, 0xab, 0x88];
pub const SEL_OWNER_OF: [u8; 4] = [0x63, 0x52, 0x21, 0x1e];
pub const SEL_GET_POOL: [u8; 4] = [0x16, 0x98, 0xee, 0x82];
pub const SEL_TOKEN_OF_OWNER_BY_INDEX: [u8; 4] = [0x2f, 0x74, 0x5c, 0x59];
pub const SEL_COLLECT: [u8; 4] = [0xfc, 0x6f, 0x78, 0x65];
pub const SEL_DEPOSITS: [u8; 4] = [0xb0, 0x2c, 0x43, 0xd0];
pub const SEL_PENDING_REWARD: [u8; 4] = [0x12, 0xf7, 0x08, 0x6c];

/// `Swap(address,address,int256,int256,uint160,uint128,int24)`
pub const SWAP_TOPIC: &str =
    "0xc42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67";

/// Assemble `0x`-prefixed calldata from a selector and 32-byte words.
pub fn calldata(selector: [u8; 4], words: &[[u8; 32]]) -> String {
    let mut bytes = Vec::with_capacity(4 + words.len() * 32);
    bytes.extend_from_slice(&selector);
    for word in words {
        bytes.extend_from_slice(word);
    }
    format!("0x{}", hex::encode(bytes))
}

pub fn encode_address(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

pub fn encode_u256(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

pub fn encode_u64(value: u64) -> [u8; 32] {
    encode_u256(U256::from(value))
}

/// Strip the `0x` prefix and decode the hex payload of a call result.
pub fn decode_hex(payload: &str) -> Result<Vec<u8>, ChainError> {
    let trimmed = payload.trim_start_matches("0x");
    hex::decode(trimmed).map_err(|e| ChainError::Decode(format!("bad hex: {}", e)))
}

/// Borrow word `index` of ABI-encoded return data.
pub fn word(data: &[u8], index: usize) -> Result<&[u8], ChainError> {
    let start = index * 32;
    let end = start + 32;
    if data.len() < end {
        return Err(ChainError::Decode(format!(
            "return data too short: wanted word {}, have {} bytes",
            index,
            data.len()
        )));
    }
    Ok(&data[start..end])
}

pub fn decode_u256(word: &[u8]) -> U256 {
    U256::from_be_slice(word)
}

pub fn decode_u128(word: &[u8]) -> Result<u128, ChainError> {
    u128::try_from(decode_u256(word))
        .map_err(|_| ChainError::Decode("uint128 out of range".to_string()))
}

pub fn decode_u32(word: &[u8]) -> Result<u32, ChainError> {
    u32::try_from(decode_u256(word))
        .map_err(|_| ChainError::Decode("uint32 out of range".to_string()))
}

pub fn decode_u64(word: &[u8]) -> Result<u64, ChainError> {
    u64::try_from(decode_u256(word))
        .map_err(|_| ChainError::Decode("uint64 out of range".to_string()))
}

pub fn decode_address(word: &[u8]) -> Address {
    Address::from_slice(&word[12..])
}

pub fn decode_i256(word: &[u8]) -> I256 {
    I256::from_raw(decode_u256(word))
}

pub fn decode_bool(word: &[u8]) -> bool {
    !decode_u256(word).is_zero()
}

/// Sign-extend a 24-bit two's-complement tick out of a 256-bit word.
pub fn decode_int24(word: &[u8]) -> i32 {
    let low = u32::from_be_bytes([word[28], word[29], word[30], word[31]]) & 0x00ff_ffff;
    ((low << 8) as i32) >> 8
}

/// Sign-extend an `int24` that was padded to a full signed word.
/// Identical to [`decode_int24`] for well-formed encodings; kept separate
/// so call sites say which encoding they expect.
pub fn decode_tick(word: &[u8]) -> i32 {
    decode_int24(word)
}

/// Decode a `string` return value. Tolerates the legacy tokens that
/// declare `bytes32` instead of `string` (MKR-style).
pub fn decode_string(data: &[u8]) -> Result<String, ChainError> {
    if data.is_empty() {
        return Err(ChainError::Decode("empty string payload".to_string()));
    }

    // bytes32 variant: exactly one word, right-padded with NULs
    if data.len() == 32 {
        let end = data.iter().position(|b| *b == 0).unwrap_or(32);
        return String::from_utf8(data[..end].to_vec())
            .map_err(|_| ChainError::Decode("bytes32 string not utf-8".to_string()));
    }

    let offset = decode_u64(word(data, 0)?)? as usize;
    if data.len() < offset + 32 {
        return Err(ChainError::Decode("string payload truncated".to_string()));
    }
    let length = decode_u64(&data[offset..offset + 32])? as usize;
    let start = offset + 32;
    if data.len() < start + length {
        return Err(ChainError::Decode("string payload truncated".to_string()));
    }
    String::from_utf8(data[start..start + length].to_vec())
        .map_err(|_| ChainError::Decode("string payload not utf-8".to_string()))
}
