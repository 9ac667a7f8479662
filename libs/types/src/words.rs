//! Fixed-width decoding of 32-byte EVM words
//!
//! All multi-byte integers on the EVM are big-endian. Every function here
//! documents the byte range it reads so the layouts can be checked against
//! the Solidity storage and ABI rules without a network.
//!
//! | value                     | byte range in the word | width |
//! |---------------------------|------------------------|-------|
//! | address (topic / slot)    | `12..32`               | 20    |
//! | `uint64` packed low       | `24..32`               | 8     |
//! | `uint192` packed high     | `0..24`                | 24    |
//! | `uint256`                 | `0..32`                | 32    |

use ethers_core::types::{Address, H256, U256};
use thiserror::Error;

/// Size of one EVM word in bytes.
pub const WORD_SIZE: usize = 32;

/// Size of a function selector in bytes.
pub const SELECTOR_SIZE: usize = 4;

/// Errors from slicing raw bytes into words
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WordError {
    #[error("word {index} out of range: payload has {available} bytes")]
    OutOfRange { index: usize, available: usize },

    #[error("calldata too short for a selector: {len} bytes")]
    MissingSelector { len: usize },
}

/// Address held in the low 20 bytes (`12..32`) of a word.
///
/// Indexed `address` event parameters and `address` storage slots are both
/// left-padded with zeros to 32 bytes; the high 12 bytes are ignored.
pub fn word_to_address(word: &H256) -> Address {
    Address::from_slice(&word.as_bytes()[12..WORD_SIZE])
}

/// Full 32-byte big-endian unsigned integer.
pub fn word_to_u256(word: &H256) -> U256 {
    U256::from_big_endian(word.as_bytes())
}

/// Low 8 bytes (`24..32`) as a big-endian `u64`.
pub fn low_u64(word: &H256) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word.as_bytes()[24..WORD_SIZE]);
    u64::from_be_bytes(buf)
}

/// High 24 bytes (`0..24`) as a big-endian unsigned integer.
///
/// This is the `uint192` half of a slot packed as `(uint192, uint64)`.
pub fn high_u192(word: &H256) -> U256 {
    U256::from_big_endian(&word.as_bytes()[0..24])
}

/// The `index`-th 32-byte word of an ABI-encoded payload.
pub fn data_word(data: &[u8], index: usize) -> Result<H256, WordError> {
    let start = index * WORD_SIZE;
    let end = start + WORD_SIZE;
    if end > data.len() {
        return Err(WordError::OutOfRange {
            index,
            available: data.len(),
        });
    }
    Ok(H256::from_slice(&data[start..end]))
}

/// Left-pad a `u64` into a word, as used for storage slot numbers.
pub fn u64_to_word(value: u64) -> H256 {
    let mut word = [0u8; WORD_SIZE];
    word[24..].copy_from_slice(&value.to_be_bytes());
    H256(word)
}

/// Split calldata into the 4-byte selector and its whole argument words.
///
/// Trailing bytes that do not fill a word are dropped; the count of complete
/// words is what the caller gets back.
pub fn split_calldata(data: &[u8]) -> Result<([u8; SELECTOR_SIZE], Vec<H256>), WordError> {
    if data.len() < SELECTOR_SIZE {
        return Err(WordError::MissingSelector { len: data.len() });
    }
    let mut selector = [0u8; SELECTOR_SIZE];
    selector.copy_from_slice(&data[..SELECTOR_SIZE]);

    let words = data[SELECTOR_SIZE..]
        .chunks_exact(WORD_SIZE)
        .map(H256::from_slice)
        .collect();
    Ok((selector, words))
}
