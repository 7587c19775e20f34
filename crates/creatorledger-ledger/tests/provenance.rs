//! End-to-end provenance flows: mint, append, verify, export, re-verify

use creatorledger_ledger::{ChainCheck, Ledger, LedgerConfig, LedgerError};
use creatorledger_proof::{verify_bytes, Verdict};
use creatorledger_types::{CreatorId, DisplayName, EventKind, ZERO_HASH};
use creatorledger_vault::MemoryVault;
use std::sync::Arc;
use tempfile::TempDir;

async fn open_ledger() -> (Arc<Ledger>, Arc<MemoryVault>, TempDir) {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
    let vault = Arc::new(MemoryVault::new());
    let ledger = Ledger::open(&LedgerConfig::with_database_url(url), vault.clone())
        .await
        .unwrap();
    (Arc::new(ledger), vault, dir)
}

fn creator(id: &str) -> CreatorId {
    CreatorId::new(id).unwrap()
}

fn kind(s: &str) -> EventKind {
    EventKind::new(s).unwrap()
}

#[tokio::test]
async fn first_appends_chain_from_zero() {
    let (ledger, _vault, _dir) = open_ledger().await;
    let id = creator("alice");
    ledger
        .create_creator(id.clone(), DisplayName::new("Alice").unwrap())
        .await
        .unwrap();

    let first = ledger
        .append(&id, kind("registered"), b"asset-1")
        .await
        .unwrap();
    assert_eq!(first.seq, 1);
    assert_eq!(first.prev_hash, ZERO_HASH);
    assert_ne!(first.this_hash, ZERO_HASH);
    assert_eq!(first.signature.len(), 64);

    let second = ledger
        .append(&id, kind("transferred"), b"to: bob")
        .await
        .unwrap();
    assert_eq!(second.seq, 2);
    assert_eq!(second.prev_hash, first.this_hash);

    assert_eq!(
        ledger.verify_chain(&id).await.unwrap(),
        ChainCheck::Ok { events: 2 }
    );
}

#[tokio::test]
async fn reads_are_pure_projections() {
    let (ledger, _vault, _dir) = open_ledger().await;
    let id = creator("alice");
    ledger
        .create_creator(id.clone(), DisplayName::new("Alice").unwrap())
        .await
        .unwrap();
    for i in 0..5u8 {
        ledger.append(&id, kind("tick"), &[i]).await.unwrap();
    }

    let all = ledger.list_events(&id, 1, None).await.unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

    // restartable: the same range reads the same rows
    let window = ledger.list_events(&id, 2, Some(4)).await.unwrap();
    assert_eq!(window.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![2, 3, 4]);
    assert_eq!(window, ledger.list_events(&id, 2, Some(4)).await.unwrap());

    let third = ledger.get_event(&id, 3).await.unwrap().unwrap();
    assert_eq!(third.payload, vec![2]);
    assert!(ledger.get_event(&id, 99).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_appenders_never_gap_or_duplicate() {
    let (ledger, _vault, _dir) = open_ledger().await;
    let id = creator("busy");
    ledger
        .create_creator(id.clone(), DisplayName::new("Busy").unwrap())
        .await
        .unwrap();

    const WRITERS: usize = 4;
    const APPENDS_PER_WRITER: usize = 5;

    let mut handles = Vec::new();
    for writer in 0..WRITERS {
        let ledger = ledger.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            let mut conflicts = 0usize;
            for i in 0..APPENDS_PER_WRITER {
                let payload = format!("w{}-{}", writer, i);
                let mut attempts = 0;
                loop {
                    match ledger.append(&id, kind("tick"), payload.as_bytes()).await {
                        Ok(_) => break,
                        Err(e) if e.is_retryable() => {
                            conflicts += 1;
                            attempts += 1;
                            assert!(attempts < 1000, "livelocked retrying appends");
                        }
                        Err(e) => panic!("append failed: {}", e),
                    }
                }
            }
            conflicts
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let events = ledger.list_events(&id, 1, None).await.unwrap();
    let total = (WRITERS * APPENDS_PER_WRITER) as u64;
    assert_eq!(events.len() as u64, total);
    assert_eq!(
        events.iter().map(|e| e.seq).collect::<Vec<_>>(),
        (1..=total).collect::<Vec<_>>()
    );
    assert_eq!(
        ledger.verify_chain(&id).await.unwrap(),
        ChainCheck::Ok { events: total }
    );
}

#[tokio::test]
async fn verify_chain_catches_tampered_rows() {
    let (ledger, _vault, _dir) = open_ledger().await;
    let id = creator("alice");
    ledger
        .create_creator(id.clone(), DisplayName::new("Alice").unwrap())
        .await
        .unwrap();
    for i in 0..3u8 {
        ledger.append(&id, kind("tick"), &[i]).await.unwrap();
    }

    // simulate on-disk corruption behind the engine's back
    sqlx::query("UPDATE ledger_events SET payload = ? WHERE creator_id = ? AND seq = 2")
        .bind(b"tampered".as_slice())
        .bind(id.as_str())
        .execute(ledger.pool())
        .await
        .unwrap();

    assert_eq!(
        ledger.verify_chain(&id).await.unwrap(),
        ChainCheck::BadSignature { seq: 2 }
    );
}

#[tokio::test]
async fn verify_chain_catches_relinked_hashes() {
    let (ledger, _vault, _dir) = open_ledger().await;
    let id = creator("alice");
    ledger
        .create_creator(id.clone(), DisplayName::new("Alice").unwrap())
        .await
        .unwrap();
    for i in 0..3u8 {
        ledger.append(&id, kind("tick"), &[i]).await.unwrap();
    }

    sqlx::query("UPDATE ledger_events SET prev_hash = ? WHERE creator_id = ? AND seq = 3")
        .bind([0x11u8; 32].as_slice())
        .bind(id.as_str())
        .execute(ledger.pool())
        .await
        .unwrap();

    assert_eq!(
        ledger.verify_chain(&id).await.unwrap(),
        ChainCheck::BrokenChain { seq: 3 }
    );
}

#[tokio::test]
async fn exported_bundle_verifies_offline() {
    let (ledger, _vault, _dir) = open_ledger().await;
    let id = creator("alice");
    ledger
        .create_creator(id.clone(), DisplayName::new("Alice (photos)").unwrap())
        .await
        .unwrap();
    ledger.append(&id, kind("registered"), b"asset-1").await.unwrap();
    ledger.append(&id, kind("transferred"), b"to: bob").await.unwrap();
    ledger.append(&id, kind("revoked"), b"reason: dmca").await.unwrap();

    let bundle = ledger.export_bundle(&id, None).await.unwrap();
    assert_eq!(bundle.events.len(), 3);

    // offline verification: nothing but the bundle bytes
    let bytes = bundle.to_bytes().unwrap();
    assert_eq!(verify_bytes(&bytes), Verdict::Ok);

    // a one-byte payload mutation pins the bad signature to its seq
    let mut tampered = bundle.clone();
    tampered.events[1].payload = {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;
        let mut payload = BASE64.decode(&tampered.events[1].payload).unwrap();
        payload[0] ^= 0x01;
        BASE64.encode(payload)
    };
    assert_eq!(
        verify_bytes(&tampered.to_bytes().unwrap()),
        Verdict::BadSignature { seq: 2 }
    );

    // reordering events breaks the chain where the order diverges
    let mut swapped = bundle.clone();
    swapped.events.swap(1, 2);
    assert_eq!(
        verify_bytes(&swapped.to_bytes().unwrap()),
        Verdict::BrokenChain { seq: 2 }
    );
}

#[tokio::test]
async fn bundle_prefix_export() {
    let (ledger, _vault, _dir) = open_ledger().await;
    let id = creator("alice");
    ledger
        .create_creator(id.clone(), DisplayName::new("Alice").unwrap())
        .await
        .unwrap();
    for i in 0..4u8 {
        ledger.append(&id, kind("tick"), &[i]).await.unwrap();
    }

    let bundle = ledger.export_bundle(&id, Some(2)).await.unwrap();
    assert_eq!(bundle.events.len(), 2);
    assert_eq!(verify_bytes(&bundle.to_bytes().unwrap()), Verdict::Ok);
}

#[tokio::test]
async fn export_unknown_creator_fails() {
    let (ledger, _vault, _dir) = open_ledger().await;
    let err = ledger
        .export_bundle(&creator("ghost"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnknownCreator { .. }));
}

#[tokio::test]
async fn chain_check_serializes_for_frontends() {
    let check = ChainCheck::BadSignature { seq: 7 };
    let json = serde_json::to_string(&check).unwrap();
    assert!(json.contains("bad_signature"));
    assert!(json.contains("7"));
}

#[tokio::test]
async fn duplicate_timestamps_and_payloads_are_allowed() {
    let (ledger, _vault, _dir) = open_ledger().await;
    let id = creator("alice");
    ledger
        .create_creator(id.clone(), DisplayName::new("Alice").unwrap())
        .await
        .unwrap();

    let first = ledger
        .append_at(&id, kind("tick"), b"same", 1_700_000_000)
        .await
        .unwrap();
    let second = ledger
        .append_at(&id, kind("tick"), b"same", 1_700_000_000)
        .await
        .unwrap();

    // same (kind, payload, timestamp) back-to-back is legal; the seq and
    // prev_hash still make the canonical bytes distinct
    assert_ne!(first.this_hash, second.this_hash);
    assert_eq!(
        ledger.verify_chain(&id).await.unwrap(),
        ChainCheck::Ok { events: 2 }
    );
}
