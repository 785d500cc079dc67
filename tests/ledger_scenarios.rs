use hashchain_ledger::config::LedgerConfig;
use hashchain_ledger::core::transaction::SUBSIDY;
use hashchain_ledger::core::blockchain::GENESIS_COINBASE_DATA;
use hashchain_ledger::core::{AppendOutcome, Block, Ledger, RejectReason, ScanMode, Transaction};
use hashchain_ledger::crypto::UnlockVerifier;
use hashchain_ledger::mining::CancelFlag;
use hashchain_ledger::LedgerError;
use std::sync::Arc;

fn ledger() -> Ledger {
    Ledger::new(&LedgerConfig::default()).unwrap()
}

fn seal_on_tail(ledger: &Ledger, block_txs: Vec<Transaction>) -> Block {
    let tail = ledger.tail().unwrap();
    ledger
        .proof_of_work()
        .seal(Block::new(tail.hash, block_txs), &CancelFlag::new())
        .unwrap()
}

#[test]
fn genesis_funds_the_recipient() {
    let ledger = ledger();

    assert_eq!(ledger.len().unwrap(), 1);
    assert_eq!(ledger.get_balance("Ivan").unwrap(), SUBSIDY);
    assert_eq!(ledger.get_balance("Bob").unwrap(), 0);

    let genesis = ledger.tail().unwrap();
    assert!(genesis.prev_hash.is_empty());
    assert!(genesis.hash.starts_with('0'));
}

#[tokio::test]
async fn transfer_moves_value_and_keeps_chain_valid() {
    let ledger = ledger();

    let block = ledger.submit_transfer("Ivan", "Bob", 3).await.unwrap();

    assert_eq!(ledger.len().unwrap(), 2);
    assert_eq!(ledger.get_balance("Bob").unwrap(), 3);
    assert_eq!(ledger.get_balance("Ivan").unwrap(), 7);

    let chain = ledger.get_chain().unwrap();
    assert_eq!(chain[1], block);
    assert!(Ledger::is_valid(&chain[1], &chain[0]));
    assert!(ledger.verify_chain().is_ok());
}

#[tokio::test]
async fn overdraft_leaves_chain_untouched() {
    let ledger = ledger();

    let err = ledger.submit_transfer("Ivan", "Bob", 11).await.unwrap_err();

    assert!(matches!(
        err,
        LedgerError::InsufficientFunds {
            required: 11,
            available: 10
        }
    ));
    assert_eq!(ledger.len().unwrap(), 1);
    assert_eq!(ledger.get_balance("Ivan").unwrap(), SUBSIDY);
}

#[tokio::test]
async fn tampered_nonce_breaks_linkage_check() {
    let ledger = ledger();
    ledger.submit_transfer("Ivan", "Bob", 3).await.unwrap();

    let chain = ledger.get_chain().unwrap();
    let mut tampered = chain[1].clone();
    tampered.nonce = format!("{}0", tampered.nonce);

    assert!(!Ledger::is_valid(&tampered, &chain[0]));
    assert!(matches!(
        Ledger::validate_link(&tampered, &chain[0]),
        Err(RejectReason::HashMismatch { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_double_spend_commits_once() {
    // Interleavings vary from run to run, so race the pair repeatedly.
    for _ in 0..25 {
        let ledger = Arc::new(ledger());

        let first = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.submit_transfer("Ivan", "Bob", 6).await }
        });
        let second = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.submit_transfer("Ivan", "Carol", 6).await }
        });

        let results = [first.await.unwrap(), second.await.unwrap()];
        let committed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1);

        let failure = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(matches!(failure, LedgerError::InsufficientFunds { .. }));

        assert_eq!(ledger.len().unwrap(), 2);
        assert_eq!(ledger.get_balance("Ivan").unwrap(), 4);
        assert_eq!(
            ledger.get_balance("Bob").unwrap() + ledger.get_balance("Carol").unwrap(),
            6
        );
        assert!(ledger.verify_chain().is_ok());
    }
}

#[tokio::test]
async fn every_block_links_and_meets_target() {
    let config = LedgerConfig {
        difficulty: 2,
        ..LedgerConfig::default()
    };
    let ledger = Ledger::new(&config).unwrap();

    ledger.submit_transfer("Ivan", "Bob", 4).await.unwrap();
    ledger.submit_transfer("Bob", "Carol", 1).await.unwrap();
    ledger.submit_transfer("Ivan", "Carol", 2).await.unwrap();

    let chain = ledger.get_chain().unwrap();
    assert_eq!(chain.len(), 4);
    for pair in chain.windows(2) {
        assert_eq!(pair[1].prev_hash, pair[0].hash);
        assert_eq!(pair[1].compute_hash(), pair[1].hash);
        assert!(pair[1].hash.starts_with("00"));
    }

    assert_eq!(ledger.get_balance("Ivan").unwrap(), 4);
    assert_eq!(ledger.get_balance("Bob").unwrap(), 3);
    assert_eq!(ledger.get_balance("Carol").unwrap(), 3);
}

#[tokio::test]
async fn balances_sum_to_minted_supply() {
    let ledger = ledger();

    ledger.submit_transfer("Ivan", "Bob", 5).await.unwrap();
    ledger.mine_reward("Bob").await.unwrap();
    ledger.mine_reward("Bob").await.unwrap();
    ledger.submit_transfer("Bob", "Carol", 12).await.unwrap();

    let holders = ["Ivan", "Bob", "Carol"];
    let total: u64 = holders.iter().map(|a| ledger.get_balance(a).unwrap()).sum();

    assert_eq!(total, 3 * SUBSIDY);
    assert_eq!(ledger.get_total_supply().unwrap(), total);
    assert_eq!(ledger.get_balance("Carol").unwrap(), 12);
}

#[test]
fn stale_block_is_rejected_not_committed() {
    let ledger = ledger();
    let tx = ledger.new_transfer_transaction("Ivan", "Bob", 2).unwrap();
    let stale = seal_on_tail(&ledger, vec![tx.clone()]);

    let winner = seal_on_tail(&ledger, vec![tx]);
    assert!(ledger.append(winner).unwrap().is_committed());

    match ledger.append(stale).unwrap() {
        AppendOutcome::Rejected(RejectReason::PrevHashMismatch { .. }) => {}
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(ledger.len().unwrap(), 2);
}

#[test]
fn replayed_transaction_is_refused() {
    let ledger = ledger();
    let tx = ledger.new_transfer_transaction("Ivan", "Bob", 2).unwrap();

    let first = seal_on_tail(&ledger, vec![tx.clone()]);
    ledger.append(first).unwrap().into_result().unwrap();

    let replay = seal_on_tail(&ledger, vec![tx]);
    let err = ledger.append(replay).unwrap().into_result().unwrap_err();
    assert!(matches!(
        err,
        LedgerError::BlockRejected(RejectReason::DuplicateTransaction { .. })
    ));
}

#[test]
fn second_spend_of_an_output_is_a_conflict() {
    let ledger = ledger();
    let to_bob = ledger.new_transfer_transaction("Ivan", "Bob", 2).unwrap();
    let to_carol = ledger.new_transfer_transaction("Ivan", "Carol", 2).unwrap();

    ledger
        .append(seal_on_tail(&ledger, vec![to_bob]))
        .unwrap()
        .into_result()
        .unwrap();

    let err = ledger
        .append(seal_on_tail(&ledger, vec![to_carol]))
        .unwrap()
        .into_result()
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::BlockRejected(RejectReason::SpendConflict { .. })
    ));
}

#[test]
fn duplicate_genesis_coinbase_cannot_destroy_value() {
    let ledger = ledger();
    let repeat = Transaction::new_coinbase("Ivan", GENESIS_COINBASE_DATA);

    let outcome = ledger.append(seal_on_tail(&ledger, vec![repeat])).unwrap();
    assert!(!outcome.is_committed());
    assert_eq!(ledger.get_balance("Ivan").unwrap(), SUBSIDY);
    assert_eq!(ledger.get_total_supply().unwrap(), SUBSIDY);
}

#[derive(Debug)]
struct CaseInsensitiveVerifier;

impl UnlockVerifier for CaseInsensitiveVerifier {
    fn verify(&self, token: &str, context: &str) -> bool {
        token.eq_ignore_ascii_case(context)
    }
}

#[tokio::test]
async fn custom_unlock_verifier_decides_ownership() {
    let ledger =
        Ledger::with_verifier(&LedgerConfig::default(), Arc::new(CaseInsensitiveVerifier)).unwrap();

    assert_eq!(ledger.get_balance("ivan").unwrap(), SUBSIDY);

    ledger.submit_transfer("IVAN", "bob", 4).await.unwrap();
    assert_eq!(ledger.get_balance("Bob").unwrap(), 4);
    assert_eq!(ledger.get_balance("Ivan").unwrap(), 6);
}

#[test]
fn empty_block_ends_scan_only_when_configured() {
    let stopping = Ledger::new(&LedgerConfig {
        scan_mode: ScanMode::StopAtEmptyBlock,
        ..LedgerConfig::default()
    })
    .unwrap();
    let full = ledger();

    for ledger in [&stopping, &full] {
        let empty = seal_on_tail(ledger, Vec::new());
        assert!(ledger.append(empty).unwrap().is_committed());
    }

    assert_eq!(stopping.get_balance("Ivan").unwrap(), 0);
    assert_eq!(full.get_balance("Ivan").unwrap(), SUBSIDY);
}
