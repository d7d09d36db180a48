use super::logging::Logger;
use super::transaction_context::{TransactionContext, WriteRecord};
use crate::storage::mvcc::CommitId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Hands out transaction ids and snapshot commit ids, and serializes
/// commits.
#[derive(Debug)]
pub struct TransactionManager {
    next_tid: AtomicU32,
    last_commit_id: AtomicU32,
    commit_lock: Mutex<()>,
    logger: Arc<dyn Logger>,
}

impl TransactionManager {
    pub fn new(logger: Arc<dyn Logger>) -> Arc<TransactionManager> {
        Arc::new(TransactionManager {
            // Transaction id 0 means "unlocked"; real ids start at 1.
            next_tid: AtomicU32::new(1),
            last_commit_id: AtomicU32::new(0),
            commit_lock: Mutex::new(()),
            logger,
        })
    }

    pub fn new_transaction_context(self: &Arc<Self>) -> Arc<TransactionContext> {
        let tid = self.next_tid.fetch_add(1, Ordering::AcqRel);
        let snapshot = self.last_commit_id.load(Ordering::Acquire);
        Arc::new(TransactionContext::new(
            tid,
            snapshot,
            self.logger.clone(),
            Arc::downgrade(self),
        ))
    }

    pub fn last_commit_id(&self) -> CommitId {
        self.last_commit_id.load(Ordering::Acquire)
    }

    /// Stamp the write set with a fresh commit id. Commits are serialized
    /// under a lock; the id becomes the newest snapshot once every row is
    /// stamped.
    pub(super) fn commit_records(
        &self,
        ctx: &TransactionContext,
        write_set: &[WriteRecord],
    ) -> CommitId {
        let _guard = self.commit_lock.lock();
        let cid = self.last_commit_id.load(Ordering::Acquire) + 1;

        for record in write_set {
            match record {
                WriteRecord::Insert { table, row } => {
                    table
                        .chunk(row.chunk)
                        .mvcc()
                        .set_begin_cid(row.offset as usize, cid);
                }
                WriteRecord::Invalidate { table, row } => {
                    table
                        .chunk(row.chunk)
                        .mvcc()
                        .set_end_cid(row.offset as usize, cid);
                }
            }
        }

        self.logger.commit(ctx.tid());
        self.last_commit_id.store(cid, Ordering::Release);
        cid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::logging::SinkLogger;
    use crate::concurrency::transaction_context::TransactionPhase;

    fn manager() -> Arc<TransactionManager> {
        TransactionManager::new(Arc::new(SinkLogger))
    }

    #[test]
    fn snapshot_follows_commits() {
        let manager = manager();
        let first = manager.new_transaction_context();
        assert_eq!(0, first.snapshot_commit_id());
        first.commit().unwrap();
        assert_eq!(1, manager.last_commit_id());

        let second = manager.new_transaction_context();
        assert_eq!(1, second.snapshot_commit_id());
        assert_ne!(first.tid(), second.tid());
    }

    #[test]
    fn commit_rejected_with_operators_in_flight() {
        let manager = manager();
        let ctx = manager.new_transaction_context();
        ctx.on_operator_started();
        assert!(ctx.commit().is_err());
        ctx.on_operator_finished();
        ctx.commit().unwrap();
        assert_eq!(TransactionPhase::Committed, ctx.phase());
    }

    #[test]
    fn abort_is_idempotent_and_blocks_commit() {
        let manager = manager();
        let ctx = manager.new_transaction_context();
        ctx.abort();
        ctx.abort();
        assert!(ctx.is_aborted());
        let err = ctx.commit().unwrap_err();
        assert_eq!(granite_error::ErrorKind::TransactionAborted, err.kind());
    }
}
