//! Watched log or pending call in, bundle out

use chainwatch_e2e_tests::{
    app_config, pending_config, pending_tx, pool_created_log, transfer_log, watched, Pipeline,
};
use mev::SubmitMode;
use mockito::Matcher;
use serde_json::json;
use types::{Address, H256, LogEvent, U256};

const ACCEPTED: &str =
    r#"{"jsonrpc":"2.0","id":1,"result":{"bundleHash":"0xbebebebebebebebebebebebebebebebebebebebebebebebebebebebebebebebe"}}"#;

fn send_bundle_for(block: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::PartialJson(json!({"method": "eth_sendBundle"})),
        Matcher::Regex(format!(r#""blockNumber":"{block}""#)),
    ])
}

#[tokio::test]
async fn test_new_pool_log_submits_bundle_for_next_block() {
    let mut relay = mockito::Server::new_async().await;
    let mock = relay
        .mock("POST", "/")
        .match_header("X-Flashbots-Signature", Matcher::Any)
        .match_body(send_bundle_for("0x1f5"))
        .with_status(200)
        .with_body(ACCEPTED)
        .expect(1)
        .create_async()
        .await;

    let cfg = app_config(&relay.url(), r#"trigger_events = ["NewPoolContract"]"#).unwrap();
    let mut pipeline = Pipeline::start(&cfg, &[500], SubmitMode::Send).await.unwrap();

    let log = pool_created_log(&pipeline.table, Address::repeat_byte(0xab), 499);
    pipeline.push(log).await;
    pipeline.settle(1).await;

    let stats = pipeline.finish().await.unwrap();
    assert_eq!(stats.triggers, 1);
    assert_eq!(stats.accepted, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_relay_rejection_is_reported_without_resubmission() {
    let mut relay = mockito::Server::new_async().await;
    let mock = relay
        .mock("POST", "/")
        .with_status(400)
        .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"bundle too old"}}"#)
        .expect(2)
        .create_async()
        .await;

    let cfg = app_config(&relay.url(), "").unwrap();
    let mut pipeline = Pipeline::start(&cfg, &[500, 501], SubmitMode::Send).await.unwrap();

    let first = pool_created_log(&pipeline.table, Address::repeat_byte(1), 500);
    let second = pool_created_log(&pipeline.table, Address::repeat_byte(2), 501);
    pipeline.push(first).await;
    pipeline.push(second).await;
    pipeline.settle(2).await;

    let stats = pipeline.finish().await.unwrap();
    // one relay call per trigger, nothing resent on rejection
    assert_eq!(stats.rejected, 2);
    assert_eq!(stats.failed, 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_transfer_below_minimum_is_skipped() {
    let mut relay = mockito::Server::new_async().await;
    let mock = relay
        .mock("POST", "/")
        .match_body(send_bundle_for("0x1f5"))
        .with_status(200)
        .with_body(ACCEPTED)
        .expect(1)
        .create_async()
        .await;

    let cfg = app_config(
        &relay.url(),
        "trigger_events = [\"Transfer\"]\nmin_trigger_amount = 1000",
    )
    .unwrap();
    let mut pipeline = Pipeline::start(&cfg, &[500], SubmitMode::Send).await.unwrap();

    let small = transfer_log(&pipeline.table, 999, 498);
    let large = transfer_log(&pipeline.table, 1_000, 499);
    pipeline.push(small).await;
    pipeline.push(large).await;
    pipeline.settle(2).await;

    let stats = pipeline.finish().await.unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.accepted, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_in_flight_bundle_blocks_second_trigger_until_target_passes() {
    let mut relay = mockito::Server::new_async().await;
    let mock = relay
        .mock("POST", "/")
        .with_status(200)
        .with_body(ACCEPTED)
        .expect(1)
        .create_async()
        .await;

    let cfg = app_config(&relay.url(), "").unwrap();
    let mut pipeline = Pipeline::start(&cfg, &[500], SubmitMode::Send).await.unwrap();

    let first = pool_created_log(&pipeline.table, Address::repeat_byte(1), 500);
    let second = pool_created_log(&pipeline.table, Address::repeat_byte(2), 500);
    pipeline.push(first).await;
    pipeline.push(second).await;
    pipeline.settle(2).await;

    let stats = pipeline.finish().await.unwrap();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.failed, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unknown_topic_never_reaches_the_relay() {
    let mut relay = mockito::Server::new_async().await;
    let mock = relay
        .mock("POST", "/")
        .with_status(200)
        .with_body(ACCEPTED)
        .expect(0)
        .create_async()
        .await;

    let cfg = app_config(&relay.url(), "").unwrap();
    let mut pipeline = Pipeline::start(&cfg, &[500], SubmitMode::Send).await.unwrap();

    pipeline
        .push(LogEvent {
            address: Address::repeat_byte(0xc0),
            topics: vec![H256::repeat_byte(0x99)],
            data: Default::default(),
            block_number: 500,
            tx_hash: H256::repeat_byte(0x01),
        })
        .await;
    let dispatched = pipeline.settle(1).await;
    assert_eq!(dispatched.unknown, 1);
    assert_eq!(dispatched.forwarded, 0);

    let stats = pipeline.finish().await.unwrap();
    assert_eq!(stats.triggers, 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_simulation_mode_calls_bundle_against_state_block() {
    let mut relay = mockito::Server::new_async().await;
    let mock = relay
        .mock("POST", "/")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({"method": "eth_callBundle"})),
            Matcher::Regex(r#""stateBlockNumber":"latest""#.into()),
        ]))
        .with_status(200)
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"results":[{"gasUsed":21000}],"totalGasUsed":42000}}"#)
        .expect(1)
        .create_async()
        .await;

    let cfg = app_config(&relay.url(), "").unwrap();
    let mut pipeline = Pipeline::start(&cfg, &[500], SubmitMode::Simulate).await.unwrap();

    let log = pool_created_log(&pipeline.table, Address::repeat_byte(3), 500);
    pipeline.push(log).await;
    pipeline.settle(1).await;

    let stats = pipeline.finish().await.unwrap();
    assert_eq!(stats.simulated, 1);
    mock.assert_async().await;
}

fn enable_presale_call() -> Vec<u8> {
    ethers::utils::id("enablePresale()").to_vec()
}

#[tokio::test]
async fn test_pending_enable_presale_call_submits_bundle() {
    let mut relay = mockito::Server::new_async().await;
    let mock = relay
        .mock("POST", "/")
        .match_body(send_bundle_for("0x1f5"))
        .with_status(200)
        .with_body(ACCEPTED)
        .expect(1)
        .create_async()
        .await;

    let cfg = pending_config(&relay.url(), Some("enablePresale")).unwrap();
    let mut pipeline = Pipeline::start(&cfg, &[500], SubmitMode::Send).await.unwrap();

    pipeline
        .announce(pending_tx(0x51, watched(), U256::zero(), enable_presale_call()))
        .await;
    let inspected = pipeline.settle_pending(1).await;
    assert_eq!(inspected.forwarded, 1);

    let stats = pipeline.finish().await.unwrap();
    assert_eq!(stats.triggers, 1);
    assert_eq!(stats.accepted, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_pending_calls_elsewhere_or_to_other_functions_are_ignored() {
    let mut relay = mockito::Server::new_async().await;
    let mock = relay
        .mock("POST", "/")
        .with_status(200)
        .with_body(ACCEPTED)
        .expect(0)
        .create_async()
        .await;

    let cfg = pending_config(&relay.url(), Some("enablePresale")).unwrap();
    let mut pipeline = Pipeline::start(&cfg, &[500], SubmitMode::Send).await.unwrap();

    // right selector, wrong contract
    let elsewhere = pending_tx(0x61, Address::repeat_byte(0x01), U256::zero(), enable_presale_call());
    // right contract, presale(1) instead of enablePresale()
    let mut presale = ethers::utils::id("presale(uint256)").to_vec();
    presale.extend_from_slice(H256::from_low_u64_be(1).as_bytes());
    let other_function = pending_tx(0x62, watched(), U256::zero(), presale);

    pipeline.announce(elsewhere).await;
    pipeline.announce(other_function).await;
    let inspected = pipeline.settle_pending(2).await;
    assert_eq!(inspected.selector_mismatch, 2);
    assert_eq!(inspected.forwarded, 0);

    let stats = pipeline.finish().await.unwrap();
    assert_eq!(stats.triggers, 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_pending_feed_without_selector_only_inspects() {
    let mut relay = mockito::Server::new_async().await;
    let mock = relay
        .mock("POST", "/")
        .with_status(200)
        .with_body(ACCEPTED)
        .expect(0)
        .create_async()
        .await;

    let cfg = pending_config(&relay.url(), None).unwrap();
    let mut pipeline = Pipeline::start(&cfg, &[500], SubmitMode::Send).await.unwrap();

    // an unrelated 1 ETH transfer and a call the selector would have matched
    pipeline
        .announce(pending_tx(0x71, Address::repeat_byte(0x02), U256::exp10(18), vec![]))
        .await;
    pipeline
        .announce(pending_tx(0x72, watched(), U256::zero(), enable_presale_call()))
        .await;
    let inspected = pipeline.settle_pending(2).await;
    assert_eq!(inspected.still_pending, 2);
    assert_eq!(inspected.inspect_only, 2);
    assert_eq!(inspected.forwarded, 0);

    let stats = pipeline.finish().await.unwrap();
    assert_eq!(stats.triggers, 0);
    mock.assert_async().await;
}
