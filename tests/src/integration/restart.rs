//! # Restart Flows
//!
//! The node reopened over the same RocksDB directory must come back with the
//! same index and resume an interrupted backfill from its cursor.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use soltable_index::{
        CheckpointKey, CheckpointStore, IndexConfig, LookupTableIndexApi, MockHistory, MockLedger,
        Signature,
    };
    use soltable_node::adapters::storage::{RocksDbConfig, RocksDbStore};
    use soltable_node::{NodeConfig, NodeRuntime};
    use tempfile::TempDir;

    use crate::integration::fixtures::*;

    fn open(dir: &TempDir) -> Arc<RocksDbStore> {
        let path = dir.path().to_string_lossy().to_string();
        Arc::new(RocksDbStore::open(RocksDbConfig::for_testing(path)).unwrap())
    }

    fn node(
        ledger: Arc<MockLedger>,
        history: Arc<MockHistory>,
        store: Arc<RocksDbStore>,
    ) -> NodeRuntime {
        let config = NodeConfig {
            index: IndexConfig::for_testing(),
            backfill_on_start: false,
            ..NodeConfig::default()
        };
        NodeRuntime::with_ports(config, ledger, history, store.clone(), store).unwrap()
    }

    #[tokio::test]
    async fn test_index_survives_restart() {
        let dir = TempDir::new().unwrap();
        let (ledger, history) = chain(3);

        {
            let runtime = node(ledger.clone(), history.clone(), open(&dir));
            runtime.service().run_backfill().await.unwrap();
            assert_eq!(runtime.service().record_count(), 6);
        }

        let store = open(&dir);
        assert_eq!(
            store.get(CheckpointKey::LastSeenCursor).unwrap(),
            Some(Signature::new("e3"))
        );

        let runtime = node(ledger, history, store);
        let service = runtime.service();
        assert_eq!(service.record_count(), 6);
        let result = service.resolve(&[addr(2), addr(3)]).unwrap();
        assert_eq!(result.selected_tables, vec![table_of(2)]);
    }

    #[tokio::test]
    async fn test_interrupted_backfill_resumes_after_restart() {
        let dir = TempDir::new().unwrap();
        let (ledger, history) = chain(6);

        {
            let runtime = node(ledger.clone(), history.clone(), open(&dir));
            history.fail_from_call(Some(1));
            assert!(runtime.service().run_backfill().await.is_err());
        }

        let store = open(&dir);
        assert_eq!(
            store.get(CheckpointKey::FirstSeenCursor).unwrap(),
            Some(Signature::new("e5"))
        );

        history.fail_from_call(None);
        let calls_before = history.calls();
        let runtime = node(ledger, history.clone(), store.clone());
        let report = runtime.service().run_backfill().await.unwrap();

        // resumed below e5: e4..e1 in two pages, then the empty page
        assert_eq!(report.events, 4);
        assert_eq!(history.calls() - calls_before, 3);
        assert_eq!(runtime.service().record_count(), 12);
        assert_eq!(store.get(CheckpointKey::FirstSeenCursor).unwrap(), None);
        assert!(store.get(CheckpointKey::LastSeenCursor).unwrap().is_some());
    }
}
