//! Classification of decoded blocks loaded from JSON fixtures.

use chainsync_ledger::{block_type, BlockClassifier, BlockEra, DecodedBlock, Era, RawBlock};

fn byron_main_fixture() -> RawBlock {
    let json = format!(
        r#"{{
            "block_type": 1,
            "block": {{
                "shape": "byron_main",
                "hash": "{hash}",
                "header": {{
                    "epoch": 207,
                    "slot_in_epoch": 21599,
                    "block_number": 4490510,
                    "issuer_key": "{issuer}"
                }},
                "transactions": [{{
                    "hash": "{tx}",
                    "size": 218,
                    "inputs": [{{"tx_id": "{prev}", "index": 1}}],
                    "outputs": [
                        {{"address": "DdzFFzCqrht", "amount": 1000000}},
                        {{"address": "Ae2tdPwUPEZ", "amount": 42}}
                    ]
                }}]
            }}
        }}"#,
        hash = "f8084c61b6a238acec985b59310b6ecec49c0ab8352249afd7268da5cff2a457",
        issuer = "aa".repeat(64),
        tx = "11".repeat(32),
        prev = "22".repeat(32),
    );
    serde_json::from_str(&json).expect("valid byron fixture")
}

fn alonzo_fixture() -> RawBlock {
    let json = format!(
        r#"{{
            "block_type": 5,
            "block": {{
                "shape": "uniform",
                "hash": "{hash}",
                "header": {{"slot": 39916797, "block_number": 6236060, "issuer_vkey": "{issuer}"}},
                "transactions": [{{
                    "hash": "{tx}",
                    "size": 1024,
                    "inputs": [{{"tx_id": "{prev}", "index": 0}}],
                    "outputs": [{{
                        "address": "addr1qx",
                        "amount": 2000000,
                        "assets": {{"{policy}": {{"4e4654": 1}}}},
                        "datum": {{"inline": {{"int": 42}}}}
                    }}],
                    "collateral": [{{"tx_id": "{prev}", "index": 2}}],
                    "certificates": ["stake_delegation"],
                    "mint": {{"{policy}": {{"4e4654": 1, "6f6c64": -5}}}},
                    "metadata": {{"674": "hello"}}
                }}]
            }}
        }}"#,
        hash = "33".repeat(32),
        issuer = "bb".repeat(32),
        tx = "44".repeat(32),
        prev = "55".repeat(32),
        policy = "66".repeat(28),
    );
    serde_json::from_str(&json).expect("valid alonzo fixture")
}

#[test]
fn test_byron_main_fixture() {
    let raw = byron_main_fixture();
    let d = BlockClassifier::new().classify(raw.block_type, &raw.block).unwrap();

    assert_eq!(d.era, BlockEra::ByronMain);
    assert_eq!(d.era_name, Era::Byron);
    assert_eq!(d.epoch, Some(207));
    assert_eq!(d.slot, Some(207 * 21600 + 21599));
    assert_eq!(d.block_number, Some(4490510));
    assert!(d.issuer_key.is_some());
    assert_eq!(d.transactions.len(), 1);

    let tx = &d.transactions[0];
    assert_eq!(tx.inputs.len(), 1);
    assert_eq!(tx.outputs[0].amount, 1000000);
    assert_eq!(tx.outputs[1].amount, 42);
    assert!(!tx.has_certificates());
    assert!(!tx.has_mint());
}

#[test]
fn test_uniform_fixture_extracts_everything() {
    let raw = alonzo_fixture();
    let d = BlockClassifier::new().classify(raw.block_type, &raw.block).unwrap();

    assert_eq!(d.era, BlockEra::ShelleyOrLater);
    assert_eq!(d.era_name, Era::Alonzo);
    assert_eq!(d.slot, Some(39916797));
    assert_eq!(d.epoch, None);

    let tx = &d.transactions[0];
    assert_eq!(tx.size, 1024);
    assert_eq!(tx.collateral.len(), 1);
    assert!(tx.has_certificates());
    assert!(tx.has_metadata);

    let output = &tx.outputs[0];
    let assets = output.assets.as_ref().expect("output assets");
    assert_eq!(assets.iter().map(|(_, _, amount)| amount).sum::<u64>(), 1);
    assert!(output.datum.is_some());

    let burned: Vec<i64> = tx.mint.as_ref().unwrap().iter().map(|(_, _, a)| a).collect();
    assert_eq!(burned, vec![1, -5]);
}

#[test]
fn test_classify_is_idempotent() {
    let classifier = BlockClassifier::new();
    for raw in [byron_main_fixture(), alonzo_fixture()] {
        let first = classifier.classify(raw.block_type, &raw.block).unwrap();
        let second = classifier.classify(raw.block_type, &raw.block).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_every_later_era_uses_uniform_shape() {
    let raw = alonzo_fixture();
    let DecodedBlock::Uniform(_) = &raw.block else {
        panic!("fixture is uniform");
    };
    let classifier = BlockClassifier::new();
    for tag in block_type::SHELLEY..=block_type::CONWAY {
        let d = classifier.classify(tag, &raw.block).unwrap();
        assert_eq!(d.era, BlockEra::ShelleyOrLater);
        assert_eq!(Some(d.era_name), Era::from_block_type(tag));
    }
}
