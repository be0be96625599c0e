//! # Backfill
//!
//! Walks the lookup table program's history backwards, page by page, and
//! reconciles every table the history touched.
//!
//! ## Checkpoints
//!
//! | Register | Meaning |
//! |----------|---------|
//! | `LAST_SEEN_CURSOR` | Scans stop at this signature (exclusive). Set once, by the first completed run. |
//! | `FIRST_SEEN_CURSOR` | Oldest signature of the last fully processed page. Resume point after a crash. |
//!
//! A page's cursor is persisted only after all of its tables reconciled, and
//! before the next page is requested. A crash therefore re-processes at most
//! one page, and reconciliation is idempotent.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use super::reconcile::Reconciler;
use crate::algorithms::tables_in_batch;
use crate::config::IndexConfig;
use crate::domain::{
    BackfillReport, CheckpointKey, HistoryEvent, IndexError, ParsedTransaction, ReconcileOutcome,
    Signature,
};
use crate::ports::{CheckpointStore, HistoryClient, LedgerClient};

/// Checkpointed history scanner.
pub struct Backfiller {
    ledger: Arc<dyn LedgerClient>,
    history: Arc<dyn HistoryClient>,
    checkpoints: Arc<dyn CheckpointStore>,
    reconciler: Arc<Reconciler>,
    config: IndexConfig,
}

impl Backfiller {
    /// Create a backfiller.
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        history: Arc<dyn HistoryClient>,
        checkpoints: Arc<dyn CheckpointStore>,
        reconciler: Arc<Reconciler>,
        config: IndexConfig,
    ) -> Self {
        Self {
            ledger,
            history,
            checkpoints,
            reconciler,
            config,
        }
    }

    /// Run until the history feed returns an empty page.
    pub async fn run(&self) -> Result<BackfillReport, IndexError> {
        let stop_at = self.checkpoints.get(CheckpointKey::LastSeenCursor)?;
        let first_run = stop_at.is_none();
        let resumed_from = self.checkpoints.get(CheckpointKey::FirstSeenCursor)?;
        let mut before = resumed_from.clone();
        let mut newest: Option<Signature> = None;
        let mut report = BackfillReport::default();

        info!(
            until = ?stop_at.as_ref().map(Signature::as_str),
            resume_from = ?before.as_ref().map(Signature::as_str),
            "[soltable] Starting backfill"
        );

        loop {
            let page = self
                .history
                .list_events(
                    &self.config.lookup_table_program,
                    before.as_ref(),
                    stop_at.as_ref(),
                    self.config.backfill_page_limit,
                )
                .await?;

            let Some(oldest) = page.last().map(|event| event.signature.clone()) else {
                break;
            };
            if newest.is_none() {
                newest = page.first().map(|event| event.signature.clone());
            }

            let reconciled = self.process_page(&page).await?;

            self.checkpoints
                .set(CheckpointKey::FirstSeenCursor, Some(&oldest))?;

            report.pages += 1;
            report.events += page.len();
            report.tables_reconciled += reconciled;
            debug!(
                page = report.pages,
                events = page.len(),
                tables = reconciled,
                cursor = %oldest,
                "[soltable] Backfill page done"
            );

            before = Some(oldest);

            if self.config.backfill_page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.backfill_page_delay_ms)).await;
            }
        }

        // A resumed first run stops later scans at the cursor it resumed from:
        // everything newer was reconciled before the interruption.
        let last_seen = match (first_run, resumed_from.or(newest)) {
            (true, Some(newest)) => {
                self.checkpoints
                    .set(CheckpointKey::LastSeenCursor, Some(&newest))?;
                Some(newest)
            }
            _ => stop_at,
        };
        self.checkpoints.set(CheckpointKey::FirstSeenCursor, None)?;

        info!(
            pages = report.pages,
            events = report.events,
            tables = report.tables_reconciled,
            "[soltable] Backfill complete"
        );

        report.last_seen_cursor = last_seen;
        Ok(report)
    }

    /// Reconcile every distinct table touched by `page`. Returns how many.
    ///
    /// A table whose account cannot be decoded is logged and skipped, so one
    /// malformed account never pins the scan to this page.
    async fn process_page(&self, page: &[HistoryEvent]) -> Result<usize, IndexError> {
        let concurrency = self.config.backfill_fetch_concurrency.max(1);
        let consistency = self.config.backfill_consistency;

        let signatures: Vec<Signature> = page
            .iter()
            .filter(|event| !event.failed)
            .map(|event| event.signature.clone())
            .collect();

        let transactions: Vec<ParsedTransaction> = stream::iter(signatures)
            .map(|signature| async move {
                self.ledger
                    .get_transaction(&signature, consistency)
                    .await?
                    .ok_or(IndexError::NotReady { signature })
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        let tables = tables_in_batch(&transactions, &self.config.lookup_table_program);

        let outcomes: Vec<Option<ReconcileOutcome>> = stream::iter(tables)
            .map(|table| async move {
                match self.reconciler.reconcile(&table).await {
                    Ok(outcome) => Ok(Some(outcome)),
                    Err(IndexError::Decode(reason)) => {
                        warn!(table = %table, %reason, "[soltable] Skipping undecodable table");
                        Ok(None)
                    }
                    Err(err) => Err(err),
                }
            })
            .buffer_unordered(concurrency)
            .try_collect()
            .await?;

        Ok(outcomes.iter().flatten().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Address, MembershipIndex, TableState, TransactionInstruction, LOOKUP_TABLE_PROGRAM_ID,
        OPCODE_EXTEND,
    };
    use crate::ports::{InMemoryCheckpointStore, InMemoryRecordStore, MockHistory, MockLedger};
    use parking_lot::RwLock;

    fn addr(n: u8) -> Address {
        Address::new([n; 32])
    }

    struct Fixture {
        ledger: Arc<MockLedger>,
        history: Arc<MockHistory>,
        checkpoints: Arc<InMemoryCheckpointStore>,
        index: Arc<RwLock<MembershipIndex>>,
        backfiller: Backfiller,
    }

    /// History e6 (newest) .. e1 (oldest); event `eN` extends table `10 + N`.
    fn fixture() -> Fixture {
        let ledger = Arc::new(MockLedger::new());
        let mut events = Vec::new();
        for n in (1..=6u8).rev() {
            let sig = format!("e{n}");
            let table = addr(10 + n);
            ledger.set_table(TableState::active(table, vec![addr(1), addr(n + 100)]));
            ledger.insert_transaction(ParsedTransaction {
                signature: Signature::new(sig.clone()),
                slot: n as u64,
                failed: false,
                instructions: vec![TransactionInstruction {
                    program_id: LOOKUP_TABLE_PROGRAM_ID,
                    accounts: vec![table],
                    data: OPCODE_EXTEND.to_le_bytes().to_vec(),
                }],
            });
            events.push(HistoryEvent::new(sig, n as u64));
        }

        let history = Arc::new(MockHistory::new(events));
        let checkpoints = Arc::new(InMemoryCheckpointStore::new());
        let index = Arc::new(RwLock::new(MembershipIndex::new()));
        let reconciler = Arc::new(Reconciler::new(
            ledger.clone(),
            Arc::new(InMemoryRecordStore::new()),
            index.clone(),
        ));
        let backfiller = Backfiller::new(
            ledger.clone(),
            history.clone(),
            checkpoints.clone(),
            reconciler,
            IndexConfig::for_testing(),
        );
        Fixture {
            ledger,
            history,
            checkpoints,
            index,
            backfiller,
        }
    }

    fn cursor(store: &InMemoryCheckpointStore, key: CheckpointKey) -> Option<String> {
        store.get(key).unwrap().map(Signature::into_string)
    }

    #[tokio::test]
    async fn test_first_run_covers_everything() {
        let fx = fixture();
        let report = fx.backfiller.run().await.unwrap();

        assert_eq!(report.pages, 3);
        assert_eq!(report.events, 6);
        assert_eq!(report.tables_reconciled, 6);
        assert_eq!(fx.index.read().table_count(), 6);
        assert_eq!(
            cursor(&fx.checkpoints, CheckpointKey::LastSeenCursor).as_deref(),
            Some("e6")
        );
        assert_eq!(cursor(&fx.checkpoints, CheckpointKey::FirstSeenCursor), None);
    }

    #[tokio::test]
    async fn test_cursor_persisted_after_each_page() {
        let fx = fixture();
        fx.backfiller.run().await.unwrap();

        let first_seen: Vec<Option<String>> = fx
            .checkpoints
            .writes()
            .into_iter()
            .filter(|(key, _)| *key == CheckpointKey::FirstSeenCursor)
            .map(|(_, sig)| sig.map(Signature::into_string))
            .collect();
        assert_eq!(
            first_seen,
            vec![
                Some("e5".to_string()),
                Some("e3".to_string()),
                Some("e1".to_string()),
                None
            ]
        );
    }

    #[tokio::test]
    async fn test_later_run_stops_at_last_seen() {
        let fx = fixture();
        fx.backfiller.run().await.unwrap();

        fx.history.push_newer(vec![HistoryEvent::new("e7", 7)]);
        fx.ledger.insert_transaction(ParsedTransaction {
            signature: Signature::new("e7"),
            slot: 7,
            failed: false,
            instructions: vec![],
        });

        let report = fx.backfiller.run().await.unwrap();
        assert_eq!(report.events, 1);
        // Not moved forward by later runs
        assert_eq!(
            report.last_seen_cursor.as_ref().map(Signature::as_str),
            Some("e6")
        );
    }

    #[tokio::test]
    async fn test_crash_keeps_last_completed_cursor() {
        let fx = fixture();
        // Page 1 (e6, e5) succeeds, fetching page 2 fails
        fx.history.fail_from_call(Some(1));

        let err = fx.backfiller.run().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            cursor(&fx.checkpoints, CheckpointKey::FirstSeenCursor).as_deref(),
            Some("e5")
        );
        assert_eq!(cursor(&fx.checkpoints, CheckpointKey::LastSeenCursor), None);
        assert_eq!(fx.index.read().table_count(), 2);

        fx.history.fail_from_call(None);
        let report = fx.backfiller.run().await.unwrap();
        assert_eq!(report.events, 4);
        assert_eq!(fx.index.read().table_count(), 6);
        assert_eq!(cursor(&fx.checkpoints, CheckpointKey::FirstSeenCursor), None);
        assert!(cursor(&fx.checkpoints, CheckpointKey::LastSeenCursor).is_some());
    }

    #[tokio::test]
    async fn test_reconcile_failure_does_not_advance_cursor() {
        let fx = fixture();
        fx.ledger.set_failing(true);

        assert!(fx.backfiller.run().await.is_err());
        assert_eq!(cursor(&fx.checkpoints, CheckpointKey::FirstSeenCursor), None);
        assert!(fx.checkpoints.writes().is_empty());
    }

    #[tokio::test]
    async fn test_checkpoint_write_failure_resumes_at_previous_cursor() {
        let fx = fixture();
        fx.history.fail_from_call(Some(1));
        fx.backfiller.run().await.unwrap_err();
        assert_eq!(
            cursor(&fx.checkpoints, CheckpointKey::FirstSeenCursor).as_deref(),
            Some("e5")
        );

        // Page (e4, e3) reconciles, then persisting its cursor fails
        fx.history.fail_from_call(None);
        fx.checkpoints.set_fail_writes(true);
        let err = fx.backfiller.run().await.unwrap_err();
        assert!(matches!(err, IndexError::Storage(_)));
        assert_eq!(fx.index.read().table_count(), 4);
        assert_eq!(
            cursor(&fx.checkpoints, CheckpointKey::FirstSeenCursor).as_deref(),
            Some("e5")
        );

        fx.checkpoints.set_fail_writes(false);
        let report = fx.backfiller.run().await.unwrap();
        assert_eq!(report.events, 4);
        assert_eq!(report.tables_reconciled, 4);
        assert_eq!(fx.index.read().table_count(), 6);
    }

    #[tokio::test]
    async fn test_resume_with_nothing_left_keeps_stop_bound() {
        let fx = fixture();
        // All three pages done, the terminating empty fetch fails
        fx.history.fail_from_call(Some(3));
        fx.backfiller.run().await.unwrap_err();
        assert_eq!(
            cursor(&fx.checkpoints, CheckpointKey::FirstSeenCursor).as_deref(),
            Some("e1")
        );
        assert_eq!(cursor(&fx.checkpoints, CheckpointKey::LastSeenCursor), None);

        fx.history.fail_from_call(None);
        let report = fx.backfiller.run().await.unwrap();
        assert_eq!(report.events, 0);
        assert_eq!(
            report.last_seen_cursor.as_ref().map(Signature::as_str),
            Some("e1")
        );
        assert_eq!(
            cursor(&fx.checkpoints, CheckpointKey::LastSeenCursor).as_deref(),
            Some("e1")
        );

        // The next run is bounded by e1 instead of rescanning all history
        let report = fx.backfiller.run().await.unwrap();
        assert_eq!(report.events, 5);
    }

    #[tokio::test]
    async fn test_resumed_first_run_stops_later_scans_at_resume_cursor() {
        let fx = fixture();
        fx.history.fail_from_call(Some(1));
        fx.backfiller.run().await.unwrap_err();

        fx.history.fail_from_call(None);
        let report = fx.backfiller.run().await.unwrap();
        assert_eq!(
            report.last_seen_cursor.as_ref().map(Signature::as_str),
            Some("e5")
        );

        // Only e6, reconciled before the interruption, lies above the bound
        let report = fx.backfiller.run().await.unwrap();
        assert_eq!(report.events, 1);
    }

    #[tokio::test]
    async fn test_undecodable_table_is_skipped() {
        let fx = fixture();
        // Event e5 touches table 15
        fx.ledger.mark_undecodable(addr(15));

        let report = fx.backfiller.run().await.unwrap();
        assert_eq!(report.events, 6);
        assert_eq!(report.tables_reconciled, 5);
        assert_eq!(fx.index.read().table_count(), 5);
        assert_eq!(fx.index.read().member_count(&addr(15)), 0);
        assert_eq!(
            cursor(&fx.checkpoints, CheckpointKey::LastSeenCursor).as_deref(),
            Some("e6")
        );
        assert_eq!(cursor(&fx.checkpoints, CheckpointKey::FirstSeenCursor), None);
    }

    #[tokio::test]
    async fn test_failed_events_are_skipped() {
        let ledger = Arc::new(MockLedger::new());
        let mut failed = HistoryEvent::new("bad", 1);
        failed.failed = true;
        let history = Arc::new(MockHistory::new(vec![failed]));
        let checkpoints = Arc::new(InMemoryCheckpointStore::new());
        let reconciler = Arc::new(Reconciler::new(
            ledger.clone(),
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(RwLock::new(MembershipIndex::new())),
        ));
        let backfiller = Backfiller::new(
            ledger.clone(),
            history,
            checkpoints.clone(),
            reconciler,
            IndexConfig::for_testing(),
        );

        // "bad" is unknown to the ledger; it must not be fetched at all
        let report = backfiller.run().await.unwrap();
        assert_eq!(report.events, 1);
        assert_eq!(report.tables_reconciled, 0);
        assert_eq!(
            cursor(&checkpoints, CheckpointKey::LastSeenCursor).as_deref(),
            Some("bad")
        );
    }

    #[tokio::test]
    async fn test_empty_history() {
        let ledger = Arc::new(MockLedger::new());
        let checkpoints = Arc::new(InMemoryCheckpointStore::new());
        let reconciler = Arc::new(Reconciler::new(
            ledger.clone(),
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(RwLock::new(MembershipIndex::new())),
        ));
        let backfiller = Backfiller::new(
            ledger,
            Arc::new(MockHistory::default()),
            checkpoints.clone(),
            reconciler,
            IndexConfig::for_testing(),
        );

        let report = backfiller.run().await.unwrap();
        assert_eq!(report.pages, 0);
        assert_eq!(report.last_seen_cursor, None);
        assert_eq!(cursor(&checkpoints, CheckpointKey::LastSeenCursor), None);
    }
}
