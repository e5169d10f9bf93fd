//! End-to-end block lifecycle tests over both storage backends.

use kvstore_app::{KvStoreApp, LOG_EXISTS, LOG_MISSING};
use kvstore_storage::KvStore;
use kvstore_storage_memory::MemStorage;
use kvstore_storage_rocksdb::{RocksDbConfig, RocksDbStorage};
use kvstore_types::{
    BlockHeader, BlockHeight, RequestBeginBlock, RequestCheckTx, RequestDeliverTx,
    RequestEndBlock, RequestQuery, Transaction, CODE_INVALID_FORMAT, CODE_OK,
};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

fn begin(height: u64) -> RequestBeginBlock {
    RequestBeginBlock {
        header: BlockHeader {
            height,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn query(key: &[u8]) -> RequestQuery {
    RequestQuery {
        data: key.to_vec(),
        ..Default::default()
    }
}

fn rocksdb_config() -> RocksDbConfig {
    RocksDbConfig {
        write_buffer_size: 4 * 1024 * 1024,
        block_cache_size: Some(8 * 1024 * 1024),
        ..RocksDbConfig::default()
    }
}

/// Run one block containing `txs`, returning each delivery's code.
fn run_block<S: KvStore>(app: &KvStoreApp<S>, height: u64, txs: &[&str]) -> Vec<u32> {
    let (mut block, _) = app.begin_block(&begin(height));
    let codes = txs
        .iter()
        .map(|raw| {
            app.deliver_tx(
                &mut block,
                &RequestDeliverTx {
                    tx: Transaction::from(*raw),
                },
            )
            .unwrap()
            .code
        })
        .collect();
    app.end_block(&block, &RequestEndBlock { height });
    app.commit(block).unwrap();
    codes
}

fn alice_and_bob<S: KvStore>(app: &KvStoreApp<S>) {
    // Admission
    let admitted = app.check_tx(&RequestCheckTx {
        tx: Transaction::from("alice=100"),
        ..Default::default()
    });
    assert_eq!(admitted.code, CODE_OK);
    let refused = app.check_tx(&RequestCheckTx {
        tx: Transaction::from("bob100"),
        ..Default::default()
    });
    assert_eq!(refused.code, CODE_INVALID_FORMAT);

    // A driver that ignores admission still gets the same verdicts at delivery
    let codes = run_block(app, 1, &["alice=100", "bob100"]);
    assert_eq!(codes, vec![CODE_OK, CODE_INVALID_FORMAT]);

    let alice = app.query(&query(b"alice")).unwrap();
    assert_eq!(alice.value, Some(b"100".to_vec()));
    assert_eq!(alice.log, LOG_EXISTS);

    let bob = app.query(&query(b"bob")).unwrap();
    assert_eq!(bob.value, None);
    assert_eq!(bob.log, LOG_MISSING);
    assert_eq!(bob.key, b"bob".to_vec());
    assert!(!app.query(&query(b"bob100")).unwrap().exists());

    // Repeated queries agree
    assert_eq!(app.query(&query(b"alice")).unwrap(), alice);
}

#[test]
fn test_alice_and_bob_in_memory() {
    alice_and_bob(&KvStoreApp::new(Arc::new(MemStorage::new())));
}

#[test]
fn test_alice_and_bob_rocksdb() {
    let temp_dir = TempDir::new().unwrap();
    let storage = RocksDbStorage::open_with_config(temp_dir.path(), rocksdb_config()).unwrap();
    alice_and_bob(&KvStoreApp::new(Arc::new(storage)));
}

#[test]
fn test_committed_state_survives_restart() {
    let temp_dir = TempDir::new().unwrap();

    {
        let storage = RocksDbStorage::open_with_config(temp_dir.path(), rocksdb_config()).unwrap();
        let app = KvStoreApp::new(Arc::new(storage));
        run_block(&app, 1, &["alice=100"]);
        run_block(&app, 2, &["alice=150", "carol=9"]);
    }

    let storage = RocksDbStorage::open_with_config(temp_dir.path(), rocksdb_config()).unwrap();
    let app = KvStoreApp::new(Arc::new(storage));
    let info = app.info(&Default::default()).unwrap();
    assert_eq!(info.last_block_height, BlockHeight(2));
    assert_eq!(
        app.query(&query(b"alice")).unwrap().value,
        Some(b"150".to_vec())
    );
    assert_eq!(app.query(&query(b"carol")).unwrap().value, Some(b"9".to_vec()));
}

#[test]
fn test_halt_before_commit_loses_whole_block() {
    let temp_dir = TempDir::new().unwrap();

    {
        let storage = RocksDbStorage::open_with_config(temp_dir.path(), rocksdb_config()).unwrap();
        let app = KvStoreApp::new(Arc::new(storage));
        run_block(&app, 1, &["alice=100"]);

        let (mut block, _) = app.begin_block(&begin(2));
        for raw in ["alice=0", "dave=1"] {
            app.deliver_tx(
                &mut block,
                &RequestDeliverTx {
                    tx: Transaction::from(raw),
                },
            )
            .unwrap();
        }
        // Halt: block and app dropped without commit
    }

    let storage = RocksDbStorage::open_with_config(temp_dir.path(), rocksdb_config()).unwrap();
    let app = KvStoreApp::new(Arc::new(storage));
    assert_eq!(
        app.query(&query(b"alice")).unwrap().value,
        Some(b"100".to_vec())
    );
    assert!(!app.query(&query(b"dave")).unwrap().exists());
    assert_eq!(
        app.info(&Default::default()).unwrap().last_block_height,
        BlockHeight(1)
    );
}

#[test]
fn test_queries_during_open_block_see_pre_block_state() {
    let app = KvStoreApp::new(Arc::new(MemStorage::new()));
    run_block(&app, 1, &["k=0"]);

    let (mut block, _) = app.begin_block(&begin(2));
    let reader = {
        let app = app.clone();
        std::thread::spawn(move || {
            for _ in 0..500 {
                let response = app.query(&query(b"k")).unwrap();
                let value = response.value.unwrap();
                // Either the whole old block or the whole new one
                match response.height.0 {
                    1 => assert_eq!(value, b"0".to_vec()),
                    2 => assert_eq!(value, b"99".to_vec()),
                    other => panic!("unexpected height {other}"),
                }
            }
        })
    };

    for i in 1..100 {
        app.deliver_tx(
            &mut block,
            &RequestDeliverTx {
                tx: Transaction::from(format!("k={i}").as_str()),
            },
        )
        .unwrap();
    }
    assert_eq!(app.query(&query(b"k")).unwrap().value, Some(b"0".to_vec()));
    app.commit(block).unwrap();
    reader.join().unwrap();

    assert_eq!(app.query(&query(b"k")).unwrap().value, Some(b"99".to_vec()));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_admission_matches_delivery(
        txs in proptest::collection::vec(proptest::collection::vec(prop_oneof![Just(b'='), Just(b'a'), Just(b'b')], 0..6), 0..12)
    ) {
        let app = KvStoreApp::new(Arc::new(MemStorage::new()));
        let (mut block, _) = app.begin_block(&begin(1));
        let mut expected = std::collections::BTreeMap::new();

        for raw in &txs {
            let tx = Transaction::new(raw.clone());
            let checked = app.check_tx(&RequestCheckTx { tx: tx.clone(), ..Default::default() });
            let delivered = app.deliver_tx(&mut block, &RequestDeliverTx { tx: tx.clone() }).unwrap();
            prop_assert_eq!(checked.code, delivered.code);

            if let Ok(kv) = tx.split() {
                expected.insert(kv.key.to_vec(), kv.value.to_vec());
            }
        }
        app.commit(block).unwrap();

        for (key, value) in &expected {
            let response = app.query(&query(key)).unwrap();
            prop_assert_eq!(response.value.as_ref(), Some(value));
        }
    }
}
