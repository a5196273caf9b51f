use std::{path::PathBuf, sync::Arc};

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use engine::{
    AccountUpdate, Engine, EngineError, LedgerEventType, NewAccount, PageRequest, Resolution,
    TransferCmd, TransferListFilter, TransferOutcome, TransferStatus,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn member(engine: &Engine, code: &str, points: i64) -> i64 {
    engine
        .create_account(NewAccount::new(code, points).name("Test", code))
        .await
        .unwrap()
        .id
}

async fn balance(engine: &Engine, id: i64) -> i64 {
    engine.account_by_id(id).await.unwrap().remaining_points
}

#[tokio::test]
async fn create_account_records_opening_balance() {
    let (engine, _db) = engine_with_db().await;

    let account = engine
        .create_account(
            NewAccount::new(" M-001 ", 150)
                .name("Ada", "Lovelace")
                .membership_level("gold")
                .email("ada@example.com"),
        )
        .await
        .unwrap();
    assert_eq!(account.member_code, "M-001");
    assert_eq!(account.remaining_points, 150);
    assert_eq!(account.registration_date.len(), "YYYY-MM-DD".len());

    let ledger = engine
        .ledger_for_account(account.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ledger.total, 1);
    let opening = &ledger.items[0];
    assert_eq!(opening.event_type, LedgerEventType::OpeningBalance);
    assert_eq!(opening.change, 150);
    assert_eq!(opening.balance_after, 150);
    assert_eq!(opening.transfer_id, None);
}

#[tokio::test]
async fn create_account_without_points_has_empty_ledger() {
    let (engine, _db) = engine_with_db().await;
    let id = member(&engine, "M-001", 0).await;

    let ledger = engine
        .ledger_for_account(id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ledger.total, 0);
    assert!(ledger.items.is_empty());
}

#[tokio::test]
async fn create_account_rejects_bad_input() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .create_account(NewAccount::new("   ", 10))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let err = engine
        .create_account(NewAccount::new("M-001", -1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    member(&engine, "M-001", 0).await;
    let err = engine
        .create_account(NewAccount::new("M-001", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test]
async fn update_account_changes_profile_only() {
    let (engine, _db) = engine_with_db().await;
    let id = member(&engine, "M-001", 40).await;
    member(&engine, "M-002", 0).await;

    let updated = engine
        .update_account(
            id,
            AccountUpdate {
                membership_level: Some("silver".to_string()),
                phone: Some("555-0100".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.membership_level, "silver");
    assert_eq!(updated.phone, "555-0100");
    assert_eq!(updated.remaining_points, 40);

    let unchanged = engine
        .update_account(id, AccountUpdate::default())
        .await
        .unwrap();
    assert_eq!(unchanged, updated);

    let err = engine
        .update_account(
            id,
            AccountUpdate {
                member_code: Some("M-002".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let err = engine
        .update_account(999, AccountUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn list_accounts_newest_first() {
    let (engine, _db) = engine_with_db().await;
    let first = member(&engine, "M-001", 0).await;
    let second = member(&engine, "M-002", 0).await;

    let ids: Vec<i64> = engine
        .list_accounts()
        .await
        .unwrap()
        .into_iter()
        .map(|account| account.id)
        .collect();
    assert_eq!(ids, vec![second, first]);
}

#[tokio::test]
async fn delete_account_refuses_referenced_members() {
    let (engine, _db) = engine_with_db().await;
    let idle = member(&engine, "M-001", 0).await;
    let funded = member(&engine, "M-002", 10).await;

    engine.delete_account(idle).await.unwrap();
    let err = engine.account_by_id(idle).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let err = engine.delete_account(funded).await.unwrap_err();
    assert!(matches!(err, EngineError::AccountInUse(_)));
    assert_eq!(balance(&engine, funded).await, 10);

    let err = engine.delete_account(idle).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn transfer_moves_points_and_writes_ledger_pair() {
    let (engine, _db) = engine_with_db().await;
    let alice = member(&engine, "M-001", 100).await;
    let bob = member(&engine, "M-002", 5).await;

    let outcome = engine
        .execute_transfer(
            TransferCmd::new(alice, bob, 30)
                .note("  birthday  ")
                .idempotency_key("k-1"),
        )
        .await
        .unwrap();
    assert!(!outcome.is_replay());

    let receipt = outcome.into_receipt();
    let transfer = &receipt.transfer;
    assert_eq!(transfer.idempotency_key, "k-1");
    assert_eq!(transfer.status, TransferStatus::Completed);
    assert_eq!(transfer.amount, 30);
    assert_eq!(transfer.note.as_deref(), Some("birthday"));
    assert!(transfer.completed_at.is_some());
    assert!(transfer.fail_reason.is_none());

    assert_eq!(receipt.ledger_entries.len(), 2);
    let out = &receipt.ledger_entries[0];
    let inn = &receipt.ledger_entries[1];
    assert_eq!(out.event_type, LedgerEventType::TransferOut);
    assert_eq!(out.user_id, alice);
    assert_eq!(out.change, -30);
    assert_eq!(out.balance_after, 70);
    assert_eq!(inn.event_type, LedgerEventType::TransferIn);
    assert_eq!(inn.user_id, bob);
    assert_eq!(inn.change, 30);
    assert_eq!(inn.balance_after, 35);
    for entry in &receipt.ledger_entries {
        assert_eq!(entry.transfer_id, Some(transfer.id));
        assert_eq!(entry.reference.as_deref(), Some("k-1"));
    }

    assert_eq!(balance(&engine, alice).await, 70);
    assert_eq!(balance(&engine, bob).await, 35);
    assert_eq!(
        engine.ledger_for_transfer(transfer.id).await.unwrap(),
        receipt.ledger_entries
    );
}

#[tokio::test]
async fn transfer_without_key_gets_generated_one() {
    let (engine, _db) = engine_with_db().await;
    let alice = member(&engine, "M-001", 10).await;
    let bob = member(&engine, "M-002", 0).await;

    let first = engine
        .execute_transfer(TransferCmd::new(alice, bob, 1))
        .await
        .unwrap()
        .into_receipt();
    let second = engine
        .execute_transfer(TransferCmd::new(alice, bob, 1))
        .await
        .unwrap()
        .into_receipt();

    assert!(uuid::Uuid::parse_str(&first.transfer.idempotency_key).is_ok());
    assert_ne!(first.transfer.idempotency_key, second.transfer.idempotency_key);
    assert_eq!(balance(&engine, alice).await, 8);
}

#[tokio::test]
async fn replayed_key_returns_original_without_side_effects() {
    let (engine, _db) = engine_with_db().await;
    let alice = member(&engine, "M-001", 100).await;
    let bob = member(&engine, "M-002", 0).await;

    let cmd = TransferCmd::new(alice, bob, 25).idempotency_key("retry-me");
    let first = engine.execute_transfer(cmd.clone()).await.unwrap();
    let second = engine.execute_transfer(cmd).await.unwrap();

    let TransferOutcome::AlreadyCompleted(replayed) = second else {
        panic!("expected a replay");
    };
    assert_eq!(&replayed, first.receipt());
    assert_eq!(balance(&engine, alice).await, 75);
    assert_eq!(balance(&engine, bob).await, 25);

    let bob_ledger = engine
        .ledger_for_account(bob, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(bob_ledger.total, 1);
}

#[tokio::test]
async fn replay_is_answered_even_when_balance_dropped() {
    let (engine, _db) = engine_with_db().await;
    let alice = member(&engine, "M-001", 50).await;
    let bob = member(&engine, "M-002", 0).await;

    let cmd = TransferCmd::new(alice, bob, 50).idempotency_key("all-in");
    engine.execute_transfer(cmd.clone()).await.unwrap();
    assert_eq!(balance(&engine, alice).await, 0);

    let outcome = engine.execute_transfer(cmd).await.unwrap();
    assert!(outcome.is_replay());
}

#[tokio::test]
async fn reused_key_with_different_request_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let alice = member(&engine, "M-001", 100).await;
    let bob = member(&engine, "M-002", 0).await;

    engine
        .execute_transfer(TransferCmd::new(alice, bob, 10).idempotency_key("k"))
        .await
        .unwrap();
    let err = engine
        .execute_transfer(TransferCmd::new(alice, bob, 11).idempotency_key("k"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::IdempotencyMismatch(_)));
    assert_eq!(balance(&engine, alice).await, 90);
}

#[tokio::test]
async fn insufficient_points_leaves_no_trace() {
    let (engine, _db) = engine_with_db().await;
    let alice = member(&engine, "M-001", 20).await;
    let bob = member(&engine, "M-002", 0).await;

    let err = engine
        .execute_transfer(TransferCmd::new(alice, bob, 21).idempotency_key("too-much"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientPoints(_)));

    assert_eq!(balance(&engine, alice).await, 20);
    assert_eq!(balance(&engine, bob).await, 0);
    assert_eq!(
        engine.resolve_transfer("too-much").await.unwrap(),
        Resolution::NotFound
    );

    // The same key can be used again once the request is valid.
    let outcome = engine
        .execute_transfer(TransferCmd::new(alice, bob, 20).idempotency_key("too-much"))
        .await
        .unwrap();
    assert!(!outcome.is_replay());
    assert_eq!(balance(&engine, alice).await, 0);
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_storage() {
    let (engine, _db) = engine_with_db().await;
    let alice = member(&engine, "M-001", 20).await;
    let bob = member(&engine, "M-002", 0).await;

    let err = engine
        .execute_transfer(TransferCmd::new(alice, alice, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransfer(_)));

    for amount in [0, -5] {
        let err = engine
            .execute_transfer(TransferCmd::new(alice, bob, amount))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    let err = engine
        .execute_transfer(TransferCmd::new(alice, bob, 5).idempotency_key("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let page = engine
        .list_transfers(&TransferListFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn unknown_accounts_are_not_found() {
    let (engine, _db) = engine_with_db().await;
    let alice = member(&engine, "M-001", 20).await;

    let err = engine
        .execute_transfer(TransferCmd::new(alice, 999, 5).idempotency_key("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let err = engine
        .execute_transfer(TransferCmd::new(999, alice, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    assert_eq!(balance(&engine, alice).await, 20);
    assert_eq!(
        engine.resolve_transfer("ghost").await.unwrap(),
        Resolution::NotFound
    );
}

#[tokio::test]
async fn transfer_lookup_by_key() {
    let (engine, _db) = engine_with_db().await;
    let alice = member(&engine, "M-001", 20).await;
    let bob = member(&engine, "M-002", 0).await;

    let created = engine
        .execute_transfer(TransferCmd::new(alice, bob, 5).idempotency_key("lookup"))
        .await
        .unwrap()
        .into_receipt();

    let found = engine.transfer_by_key("lookup").await.unwrap();
    assert_eq!(found, created);
    assert_eq!(
        engine.resolve_transfer("lookup").await.unwrap(),
        Resolution::Committed(created.transfer)
    );

    let err = engine.transfer_by_key("missing").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn list_transfers_filters_and_pages() {
    let (engine, _db) = engine_with_db().await;
    let alice = member(&engine, "M-001", 100).await;
    let bob = member(&engine, "M-002", 100).await;
    let carol = member(&engine, "M-003", 100).await;

    let mut ids = Vec::new();
    for (from, to) in [(alice, bob), (bob, carol), (carol, alice), (alice, carol)] {
        let receipt = engine
            .execute_transfer(TransferCmd::new(from, to, 1))
            .await
            .unwrap()
            .into_receipt();
        ids.push(receipt.transfer.id);
    }

    let all = engine
        .list_transfers(&TransferListFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(all.total, 4);
    let listed: Vec<i64> = all.items.iter().map(|t| t.id).collect();
    let mut newest_first = ids.clone();
    newest_first.reverse();
    assert_eq!(listed, newest_first);

    let bobs = engine
        .list_transfers(&TransferListFilter::for_user(bob), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(bobs.total, 2);
    assert!(
        bobs.items
            .iter()
            .all(|t| t.from_user_id == bob || t.to_user_id == bob)
    );

    let second_page = engine
        .list_transfers(&TransferListFilter::default(), PageRequest::new(2, 3))
        .await
        .unwrap();
    assert_eq!(second_page.total, 4);
    assert_eq!(second_page.page, 2);
    assert_eq!(second_page.page_size, 3);
    assert_eq!(second_page.items.len(), 1);
    assert_eq!(second_page.items[0].id, ids[0]);
}

#[tokio::test]
async fn ledger_for_account_pages_newest_first() {
    let (engine, _db) = engine_with_db().await;
    let alice = member(&engine, "M-001", 10).await;
    let bob = member(&engine, "M-002", 0).await;

    for _ in 0..3 {
        engine
            .execute_transfer(TransferCmd::new(alice, bob, 2))
            .await
            .unwrap();
    }

    let first = engine
        .ledger_for_account(alice, PageRequest::new(1, 2))
        .await
        .unwrap();
    assert_eq!(first.total, 4);
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.items[0].balance_after, 4);
    assert_eq!(first.items[1].balance_after, 6);

    let last = engine
        .ledger_for_account(alice, PageRequest::new(2, 2))
        .await
        .unwrap();
    assert_eq!(last.items.len(), 2);
    assert_eq!(last.items[1].event_type, LedgerEventType::OpeningBalance);

    let err = engine
        .ledger_for_account(999, PageRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn failed_credit_rolls_back_the_whole_unit() {
    let (engine, _db) = engine_with_db().await;
    let alice = member(&engine, "M-001", 100).await;
    let bob = member(&engine, "M-002", i64::MAX - 10).await;

    let err = engine
        .execute_transfer(TransferCmd::new(alice, bob, 30).idempotency_key("overflow"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BalanceOverflow(_)));

    assert_eq!(balance(&engine, alice).await, 100);
    assert_eq!(balance(&engine, bob).await, i64::MAX - 10);
    let transfers = engine
        .list_transfers(&TransferListFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(transfers.total, 0);
    assert_eq!(
        engine.resolve_transfer("overflow").await.unwrap(),
        Resolution::NotFound
    );

    let ledger = engine
        .ledger_for_account(alice, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ledger.total, 1);
    assert_eq!(ledger.items[0].event_type, LedgerEventType::OpeningBalance);
}

async fn engine_with_file_db() -> (Engine, PathBuf) {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("engine_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();

    (engine, path)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_with_same_key_execute_once() {
    let (engine, path) = engine_with_file_db().await;
    let alice = member(&engine, "M-001", 100).await;
    let bob = member(&engine, "M-002", 0).await;
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for _ in 0..12 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .execute_transfer(TransferCmd::new(alice, bob, 40).idempotency_key("race"))
                .await
        }));
    }

    let mut created = 0;
    let mut transfer_ids = Vec::new();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if !outcome.is_replay() {
            created += 1;
        }
        transfer_ids.push(outcome.receipt().transfer.id);
    }

    assert_eq!(created, 1);
    transfer_ids.dedup();
    assert_eq!(transfer_ids.len(), 1);
    assert_eq!(balance(&engine, alice).await, 60);
    assert_eq!(balance(&engine, bob).await, 40);

    let transfers = engine
        .list_transfers(&TransferListFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(transfers.total, 1);
    let pair = engine.ledger_for_transfer(transfer_ids[0]).await.unwrap();
    assert_eq!(pair.len(), 2);

    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_on_disjoint_pairs_all_complete() {
    let (engine, path) = engine_with_file_db().await;
    let mut pairs = Vec::new();
    for n in 0..6 {
        let from = member(&engine, &format!("S-{n:03}"), 100).await;
        let to = member(&engine, &format!("D-{n:03}"), 0).await;
        pairs.push((from, to));
    }
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for &(from, to) in &pairs {
        for _ in 0..4 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.execute_transfer(TransferCmd::new(from, to, 25)).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for (from, to) in pairs {
        assert_eq!(balance(&engine, from).await, 0);
        assert_eq!(balance(&engine, to).await, 100);
    }
    let transfers = engine
        .list_transfers(&TransferListFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(transfers.total, 24);

    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contending_transfers_conserve_points() {
    let (engine, path) = engine_with_file_db().await;
    let mut ids = Vec::new();
    for n in 0..4 {
        ids.push(member(&engine, &format!("M-{n:03}"), 50_000).await);
    }
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for n in 0..200 {
        let engine = Arc::clone(&engine);
        let from = ids[n % ids.len()];
        let to = ids[(n + 1) % ids.len()];
        handles.push(tokio::spawn(async move {
            engine.execute_transfer(TransferCmd::new(from, to, 7)).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    let mut total = 0;
    for &id in &ids {
        let points = balance(&engine, id).await;
        let ledger = engine
            .ledger_for_account(id, PageRequest::new(1, 200))
            .await
            .unwrap();
        let replayed: i64 = ledger.items.iter().map(|entry| entry.change).sum();
        assert_eq!(replayed, points);
        total += points;
    }
    assert_eq!(total, 200_000);

    let transfers = engine
        .list_transfers(&TransferListFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(transfers.total, succeeded);

    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_never_overdraw() {
    let (engine, path) = engine_with_file_db().await;
    let alice = member(&engine, "M-001", 100).await;
    let bob = member(&engine, "M-002", 0).await;
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for _ in 0..5 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.execute_transfer(TransferCmd::new(alice, bob, 30)).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(err) => assert!(matches!(err, EngineError::InsufficientPoints(_))),
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(balance(&engine, alice).await, 10);
    assert_eq!(balance(&engine, bob).await, 90);

    let ledger = engine
        .ledger_for_account(alice, PageRequest::default())
        .await
        .unwrap();
    let sum: i64 = ledger.items.iter().map(|entry| entry.change).sum();
    assert_eq!(sum, 10);

    let _ = std::fs::remove_file(path);
}
