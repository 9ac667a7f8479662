//! Read-only inspection of array-backed contract storage
//!
//! Layout of a `LockRecord[]` dynamic array at `base_slot`:
//!
//! ```text
//! slot(base)                 array length
//! keccak256(base) + 2i       user address, low 20 bytes
//! keccak256(base) + 2i + 1   amount (uint192, bytes 0..24) | startTime (uint64, bytes 24..32)
//! ```

use ethers_core::utils::keccak256;
use network::{ChainClient, ChainError};
use tracing::{debug, warn};
use types::words::{high_u192, low_u64, u64_to_word, word_to_address, word_to_u256};
use types::{Address, H256, U256};

/// One two-slot array element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEntry {
    pub user: Address,
    pub start_time: u64,
    pub amount: U256,
}

impl LockEntry {
    /// Decode from the element's two slots.
    pub fn from_slots(first: &H256, second: &H256) -> Self {
        Self {
            user: word_to_address(first),
            start_time: low_u64(second),
            amount: high_u192(second),
        }
    }
}

/// Slot holding element `index`'s first word
pub fn element_slot(base_slot: u64, index: u64) -> H256 {
    let data_start = U256::from_big_endian(&keccak256(u64_to_word(base_slot)));
    let slot = data_start.overflowing_add(U256::from(index) * 2).0;
    let mut word = [0u8; 32];
    slot.to_big_endian(&mut word);
    H256(word)
}

fn next_slot(slot: H256) -> H256 {
    let next = U256::from_big_endian(slot.as_bytes()).overflowing_add(U256::one()).0;
    let mut word = [0u8; 32];
    next.to_big_endian(&mut word);
    H256(word)
}

/// Read up to `max_entries` elements of the array at `base_slot`.
pub async fn read_lock_array(
    client: &dyn ChainClient,
    contract: Address,
    base_slot: u64,
    max_entries: u64,
) -> Result<Vec<LockEntry>, ChainError> {
    let length_word = client.storage_at(contract, u64_to_word(base_slot)).await?;
    let length = word_to_u256(&length_word);
    let count = if length > U256::from(max_entries) {
        warn!(
            contract = ?contract,
            length = %length,
            max_entries,
            "⚠️ Lock array longer than the read limit, truncating"
        );
        max_entries
    } else {
        length.as_u64()
    };
    debug!(contract = ?contract, base_slot, count, "Reading lock array");

    let mut entries = Vec::with_capacity(count as usize);
    for index in 0..count {
        let first = element_slot(base_slot, index);
        let user_word = client.storage_at(contract, first).await?;
        let packed = client.storage_at(contract, next_slot(first)).await?;
        entries.push(LockEntry::from_slots(&user_word, &packed));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use network::testing::ScriptedChainClient;

    fn packed(amount: u64, start_time: u64) -> H256 {
        let mut word = [0u8; 32];
        word[16..24].copy_from_slice(&amount.to_be_bytes());
        word[24..].copy_from_slice(&start_time.to_be_bytes());
        H256(word)
    }

    #[test]
    fn test_slot_zero_layout() {
        // keccak256(uint256(0))
        let expected: H256 = "0x290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563"
            .parse()
            .unwrap();
        assert_eq!(element_slot(0, 0), expected);

        let third = U256::from_big_endian(element_slot(0, 1).as_bytes());
        assert_eq!(third - U256::from_big_endian(expected.as_bytes()), U256::from(2u64));
        assert_eq!(next_slot(element_slot(0, 0)), {
            let mut w = [0u8; 32];
            (U256::from_big_endian(expected.as_bytes()) + 1).to_big_endian(&mut w);
            H256(w)
        });
    }

    #[test]
    fn test_entry_decoding() {
        let user = Address::repeat_byte(0x5a);
        let entry = LockEntry::from_slots(&H256::from(user), &packed(1_000, 1_700_000_000));
        assert_eq!(entry.user, user);
        assert_eq!(entry.amount, U256::from(1_000u64));
        assert_eq!(entry.start_time, 1_700_000_000);
    }

    #[tokio::test]
    async fn test_reads_entries_up_to_limit() {
        let client = ScriptedChainClient::new(1);
        let contract = Address::repeat_byte(0xc0);
        let base = 3;

        client.set_storage(contract, u64_to_word(base), u64_to_word(3));
        for i in 0..3u64 {
            let first = element_slot(base, i);
            client.set_storage(contract, first, H256::from(Address::from_low_u64_be(i + 1)));
            client.set_storage(contract, next_slot(first), packed(100 * (i + 1), 10 + i));
        }

        let all = read_lock_array(&client, contract, base, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].user, Address::from_low_u64_be(3));
        assert_eq!(all[2].amount, U256::from(300u64));
        assert_eq!(all[2].start_time, 12);

        let limited = read_lock_array(&client, contract, base, 2).await.unwrap();
        assert_eq!(limited, all[..2].to_vec());
    }

    #[tokio::test]
    async fn test_empty_array() {
        let client = ScriptedChainClient::new(1);
        let entries = read_lock_array(&client, Address::zero(), 0, 10).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(client.call_count("eth_getStorageAt"), 1);
    }
}
