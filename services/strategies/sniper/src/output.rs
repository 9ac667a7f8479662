//! JSON rendering for one-shot CLI modes

use mev::ExecutionReport;
use serde_json::{json, Value};
use types::SignedBundle;
use watcher::LockEntry;

fn bundle_json(bundle: &SignedBundle) -> Value {
    json!({
        "targetBlock": bundle.target_block,
        "observedHead": bundle.observed_head,
        "nonces": bundle.nonces(),
        "txHashes": bundle
            .transactions
            .iter()
            .map(|tx| format!("{:?}", tx.hash))
            .collect::<Vec<_>>(),
    })
}

pub fn report_json(report: &ExecutionReport) -> Value {
    match report {
        ExecutionReport::Skipped { amount, minimum } => json!({
            "outcome": "skipped",
            "amount": amount.to_string(),
            "minimum": minimum.to_string(),
        }),
        ExecutionReport::Accepted { bundle, bundle_hash } => json!({
            "outcome": "accepted",
            "bundleHash": format!("{bundle_hash:?}"),
            "bundle": bundle_json(bundle),
        }),
        ExecutionReport::Simulated { bundle, result } => json!({
            "outcome": "simulated",
            "bundle": bundle_json(bundle),
            "simulation": result,
            "failure": result.first_failure(),
        }),
        ExecutionReport::Rejected {
            bundle,
            code,
            message,
        } => json!({
            "outcome": "rejected",
            "code": code,
            "message": message,
            "bundle": bundle_json(bundle),
        }),
    }
}

pub fn lock_json(index: usize, entry: &LockEntry) -> Value {
    json!({
        "index": index,
        "user": format!("{:?}", entry.user),
        "startTime": entry.start_time,
        "amount": entry.amount.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{Address, Bytes, SignedTx, H256, U256};

    fn bundle() -> SignedBundle {
        SignedBundle {
            transactions: vec![
                SignedTx {
                    hash: H256::repeat_byte(1),
                    nonce: 7,
                    raw: Bytes::from(vec![0x01]),
                },
                SignedTx {
                    hash: H256::repeat_byte(2),
                    nonce: 8,
                    raw: Bytes::from(vec![0x02]),
                },
            ],
            target_block: 101,
            observed_head: 100,
        }
    }

    #[test]
    fn test_rejected_report() {
        let value = report_json(&ExecutionReport::Rejected {
            bundle: bundle(),
            code: -32000,
            message: "bundle too old".into(),
        });
        assert_eq!(value["outcome"], "rejected");
        assert_eq!(value["message"], "bundle too old");
        assert_eq!(value["bundle"]["targetBlock"], 101);
        assert_eq!(value["bundle"]["nonces"], json!([7, 8]));
    }

    #[test]
    fn test_skipped_report_has_no_bundle() {
        let value = report_json(&ExecutionReport::Skipped {
            amount: U256::from(999u64),
            minimum: U256::from(1_000u64),
        });
        assert_eq!(value["amount"], "999");
        assert!(value.get("bundle").is_none());
    }

    #[test]
    fn test_lock_entry() {
        let entry = LockEntry {
            user: Address::repeat_byte(0xab),
            start_time: 1_700_000_000,
            amount: U256::exp10(18),
        };
        let value = lock_json(3, &entry);
        assert_eq!(value["startTime"], 1_700_000_000u64);
        assert_eq!(value["amount"], "1000000000000000000");
        assert_eq!(value["user"], "0xabababababababababababababababababababab");
    }
}
