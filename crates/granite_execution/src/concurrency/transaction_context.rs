use super::logging::Logger;
use super::transaction_manager::TransactionManager;
use crate::storage::mvcc::{CommitId, TransactionId};
use crate::storage::{RowId, Table};
use granite_error::{GraniteError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    Active,
    Committing,
    Committed,
    RolledBack,
}

impl TransactionPhase {
    fn from_u8(v: u8) -> TransactionPhase {
        match v {
            0 => TransactionPhase::Active,
            1 => TransactionPhase::Committing,
            2 => TransactionPhase::Committed,
            _ => TransactionPhase::RolledBack,
        }
    }
}

/// A row version created or invalidated by this transaction, undone on
/// rollback and stamped with the commit id on commit.
#[derive(Debug)]
pub enum WriteRecord {
    Insert {
        table: Arc<Table>,
        row: RowId,
    },
    Invalidate {
        table: Arc<Table>,
        row: RowId,
    },
}

/// Per-query transaction state. Every operator of a query holds a weak
/// pointer to the same context; it coordinates abort, tracks in-flight
/// operators and collects the write set.
#[derive(Debug)]
pub struct TransactionContext {
    tid: TransactionId,
    snapshot_cid: CommitId,
    phase: AtomicU8,
    num_active_operators: AtomicU32,
    aborted: AtomicBool,
    write_set: Mutex<Vec<WriteRecord>>,
    error: Mutex<Option<GraniteError>>,
    logger: Arc<dyn Logger>,
    manager: Weak<TransactionManager>,
}

impl TransactionContext {
    pub(super) fn new(
        tid: TransactionId,
        snapshot_cid: CommitId,
        logger: Arc<dyn Logger>,
        manager: Weak<TransactionManager>,
    ) -> TransactionContext {
        TransactionContext {
            tid,
            snapshot_cid,
            phase: AtomicU8::new(TransactionPhase::Active as u8),
            num_active_operators: AtomicU32::new(0),
            aborted: AtomicBool::new(false),
            write_set: Mutex::new(Vec::new()),
            error: Mutex::new(None),
            logger,
            manager,
        }
    }

    pub fn tid(&self) -> TransactionId {
        self.tid
    }

    pub fn snapshot_commit_id(&self) -> CommitId {
        self.snapshot_cid
    }

    pub fn phase(&self) -> TransactionPhase {
        TransactionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn on_operator_started(&self) {
        debug_assert_eq!(TransactionPhase::Active, self.phase());
        self.num_active_operators.fetch_add(1, Ordering::AcqRel);
    }

    pub fn on_operator_finished(&self) {
        let before = self.num_active_operators.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(before > 0, "operator counter underflow");
    }

    pub fn num_active_operators(&self) -> u32 {
        self.num_active_operators.load(Ordering::Acquire)
    }

    /// Flag the transaction as aborted. Idempotent and irreversible;
    /// operators that have not started yet will return without output.
    pub fn abort(&self) {
        if !self.aborted.swap(true, Ordering::AcqRel) {
            debug!(tid = self.tid, "transaction aborted");
        }
    }

    /// Record a failure against this transaction and abort it. The first
    /// error wins; later ones are dropped.
    pub fn fail(&self, error: GraniteError) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
        drop(slot);
        self.abort();
    }

    pub fn take_error(&self) -> Option<GraniteError> {
        self.error.lock().take()
    }

    pub fn record_insert(&self, table: Arc<Table>, row: RowId) {
        self.write_set.lock().push(WriteRecord::Insert { table, row });
    }

    pub fn record_invalidate(&self, table: Arc<Table>, row: RowId) {
        self.write_set
            .lock()
            .push(WriteRecord::Invalidate { table, row });
    }

    /// Commit this transaction. Rejected while operators are in flight or
    /// after an abort.
    pub fn commit(&self) -> Result<CommitId> {
        if self.is_aborted() {
            return Err(GraniteError::transaction_aborted());
        }
        if self.num_active_operators() > 0 {
            return Err(GraniteError::new(
                "cannot commit while operators are in flight",
            ));
        }
        self.phase
            .compare_exchange(
                TransactionPhase::Active as u8,
                TransactionPhase::Committing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| GraniteError::new("transaction is not active"))?;

        let manager = self
            .manager
            .upgrade()
            .ok_or_else(|| GraniteError::new("transaction manager is gone"))?;
        let cid = manager.commit_records(self, &self.write_set.lock());
        self.phase
            .store(TransactionPhase::Committed as u8, Ordering::Release);
        debug!(tid = self.tid, cid, "transaction committed");
        Ok(cid)
    }

    /// Undo every row version this transaction produced.
    pub fn rollback(&self) {
        let previous = self
            .phase
            .swap(TransactionPhase::RolledBack as u8, Ordering::AcqRel);
        if TransactionPhase::from_u8(previous) == TransactionPhase::RolledBack {
            return;
        }
        self.abort();

        let write_set = self.write_set.lock();
        for record in write_set.iter() {
            match record {
                WriteRecord::Insert { table, row } => {
                    let mvcc_chunk = table.chunk(row.chunk);
                    let mvcc = mvcc_chunk.mvcc();
                    // Never committed: make the row permanently invisible.
                    mvcc.set_end_cid(row.offset as usize, 0);
                    mvcc.unlock_row(row.offset as usize, self.tid);
                }
                WriteRecord::Invalidate { table, row } => {
                    let mvcc_chunk = table.chunk(row.chunk);
                    mvcc_chunk.mvcc().unlock_row(row.offset as usize, self.tid);
                }
            }
        }
        debug!(tid = self.tid, "transaction rolled back");
    }
}
