//! The engine value owning catalog, transaction manager and scheduler.
//! Everything is threaded explicitly; there are no process-wide singletons.

pub mod session;

pub use session::{Session, StatementResult};

use crate::concurrency::logging::SinkLogger;
use crate::concurrency::TransactionManager;
use crate::storage::table::DEFAULT_TARGET_CHUNK_SIZE;
use crate::storage::StorageManager;
use granite_error::Result;
use granite_scheduler::{NodeQueueScheduler, Topology};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of NUMA nodes to split the detected CPUs into. Ignored when an
    /// explicit topology is given.
    pub num_numa_nodes: usize,
    /// Explicit topology, mainly for tests wanting a deterministic layout.
    pub topology: Option<Topology>,
    pub target_chunk_size: usize,
    /// Translate queries with Validate nodes, making them MVCC aware.
    pub validate_queries: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            num_numa_nodes: 1,
            topology: None,
            target_chunk_size: DEFAULT_TARGET_CHUNK_SIZE,
            validate_queries: true,
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    storage: Arc<StorageManager>,
    transaction_manager: Arc<TransactionManager>,
    scheduler: Arc<NodeQueueScheduler>,
}

impl Engine {
    pub fn try_new(config: EngineConfig) -> Result<Engine> {
        let topology = match &config.topology {
            Some(topology) => topology.clone(),
            None => Topology::detect_with_nodes(config.num_numa_nodes),
        };
        let scheduler = NodeQueueScheduler::try_new(&topology)?;

        Ok(Engine {
            config,
            storage: Arc::new(StorageManager::new()),
            transaction_manager: TransactionManager::new(Arc::new(SinkLogger)),
            scheduler,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    pub fn transaction_manager(&self) -> &Arc<TransactionManager> {
        &self.transaction_manager
    }

    pub fn scheduler(&self) -> &Arc<NodeQueueScheduler> {
        &self.scheduler
    }

    pub fn session(&self) -> Session<'_> {
        Session::new(self)
    }

    /// Drain outstanding work and stop the workers. Also runs on drop.
    pub fn shutdown(&self) {
        self.scheduler.finish();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.scheduler.finish();
    }
}
