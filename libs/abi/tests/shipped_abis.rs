//! The ABI files under `abis/` load and expose what the pipeline binds to.

use abi::{load_abi, CallEncoder, EventKind, SignatureTable};
use std::path::PathBuf;

fn abi_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../abis")
}

#[test]
fn launchpad_events_bind_to_typed_kinds() {
    let contract = load_abi(&abi_dir(), "launchpad.json").unwrap();
    let table = SignatureTable::from_contract(
        &contract,
        &["NewIDOContract".to_string(), "PoolParametersSet".to_string()],
    )
    .unwrap();

    assert_eq!(table.len(), 2);
    let kinds: Vec<EventKind> = table
        .topics()
        .iter()
        .map(|t| table.get(t).unwrap().kind)
        .collect();
    assert_eq!(kinds, vec![EventKind::PoolCreated, EventKind::PoolParametersSet]);
}

#[test]
fn launchpad_functions_encode() {
    let contract = load_abi(&abi_dir(), "launchpad.json").unwrap();
    let presale = CallEncoder::from_contract(&contract, "presale").unwrap();
    let enable = CallEncoder::from_contract(&contract, "enablePresale").unwrap();

    assert_eq!(presale.encode_args(&["1000"]).unwrap().len(), 36);
    assert_ne!(presale.selector(), enable.selector());
}

#[test]
fn erc20_transfer_topic_is_standard() {
    let contract = load_abi(&abi_dir(), "erc20.json").unwrap();
    let table = SignatureTable::from_contract(&contract, &["Transfer".to_string()]).unwrap();
    assert_eq!(
        format!("{:x}", table.topics()[0]),
        "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
    );
}
