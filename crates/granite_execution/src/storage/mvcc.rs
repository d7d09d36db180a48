use std::sync::atomic::{AtomicU32, Ordering};

pub type TransactionId = u32;
pub type CommitId = u32;

/// Commit id that no snapshot ever reaches; rows with this begin id are
/// uncommitted.
pub const MAX_COMMIT_ID: CommitId = u32::MAX;

/// Transaction id meaning "not locked by anyone".
pub const NO_TRANSACTION_ID: TransactionId = 0;

/// Per-row version data of one chunk, sized to the chunk's capacity up front
/// so that readers never race a reallocation.
#[derive(Debug)]
pub struct MvccColumns {
    tids: Vec<AtomicU32>,
    begin_cids: Vec<AtomicU32>,
    end_cids: Vec<AtomicU32>,
}

impl MvccColumns {
    pub fn with_capacity(capacity: usize) -> MvccColumns {
        MvccColumns {
            tids: (0..capacity).map(|_| AtomicU32::new(NO_TRANSACTION_ID)).collect(),
            begin_cids: (0..capacity).map(|_| AtomicU32::new(MAX_COMMIT_ID)).collect(),
            end_cids: (0..capacity).map(|_| AtomicU32::new(MAX_COMMIT_ID)).collect(),
        }
    }

    pub fn tid(&self, offset: usize) -> TransactionId {
        self.tids[offset].load(Ordering::Acquire)
    }

    pub fn begin_cid(&self, offset: usize) -> CommitId {
        self.begin_cids[offset].load(Ordering::Acquire)
    }

    pub fn end_cid(&self, offset: usize) -> CommitId {
        self.end_cids[offset].load(Ordering::Acquire)
    }

    pub fn set_tid(&self, offset: usize, tid: TransactionId) {
        self.tids[offset].store(tid, Ordering::Release);
    }

    pub fn set_begin_cid(&self, offset: usize, cid: CommitId) {
        self.begin_cids[offset].store(cid, Ordering::Release);
    }

    pub fn set_end_cid(&self, offset: usize, cid: CommitId) {
        self.end_cids[offset].store(cid, Ordering::Release);
    }

    /// Row lock for deletion: succeeds if the row is unlocked or already held
    /// by `tid`.
    pub fn try_lock_row(&self, offset: usize, tid: TransactionId) -> bool {
        match self.tids[offset].compare_exchange(
            NO_TRANSACTION_ID,
            tid,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => current == tid,
        }
    }

    pub fn unlock_row(&self, offset: usize, tid: TransactionId) {
        let _ = self.tids[offset].compare_exchange(
            tid,
            NO_TRANSACTION_ID,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// The visibility predicate: a row is visible to a transaction iff
/// `((own ^ committed_before_snapshot)) && not deleted before snapshot`.
///
/// The XOR covers both directions: an own uncommitted insert (tid matches,
/// begin still MAX) is visible, a foreign uncommitted insert is not, and an
/// own pending delete (tid matches, begin committed) is already invisible to
/// the deleting transaction itself.
pub fn is_row_visible(
    our_tid: TransactionId,
    snapshot_cid: CommitId,
    row_tid: TransactionId,
    begin_cid: CommitId,
    end_cid: CommitId,
) -> bool {
    ((our_tid == row_tid) ^ (begin_cid <= snapshot_cid)) && end_cid > snapshot_cid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_truth_table() {
        let our = 7;
        let snapshot = 10;

        // Committed insert, not deleted.
        assert!(is_row_visible(our, snapshot, NO_TRANSACTION_ID, 5, MAX_COMMIT_ID));
        // Committed after our snapshot.
        assert!(!is_row_visible(our, snapshot, NO_TRANSACTION_ID, 11, MAX_COMMIT_ID));
        // Our own uncommitted insert.
        assert!(is_row_visible(our, snapshot, our, MAX_COMMIT_ID, MAX_COMMIT_ID));
        // Foreign uncommitted insert.
        assert!(!is_row_visible(our, snapshot, 9, MAX_COMMIT_ID, MAX_COMMIT_ID));
        // Our own pending delete of a committed row.
        assert!(!is_row_visible(our, snapshot, our, 5, MAX_COMMIT_ID));
        // Foreign pending delete: still visible to us.
        assert!(is_row_visible(our, snapshot, 9, 5, MAX_COMMIT_ID));
        // Deleted before our snapshot.
        assert!(!is_row_visible(our, snapshot, NO_TRANSACTION_ID, 5, 10));
    }

    #[test]
    fn row_lock_is_exclusive() {
        let mvcc = MvccColumns::with_capacity(1);
        assert!(mvcc.try_lock_row(0, 3));
        // Re-entrant for the same transaction.
        assert!(mvcc.try_lock_row(0, 3));
        assert!(!mvcc.try_lock_row(0, 4));
        mvcc.unlock_row(0, 3);
        assert!(mvcc.try_lock_row(0, 4));
    }
}
