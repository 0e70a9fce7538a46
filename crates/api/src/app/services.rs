use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use gridcast_infra::{
    Backends, BaselineRuntime, GridcastConfig, GridcastNode, InMemoryDriftHistory, InMemoryRecordStore,
    InMemoryRetrainSink, NodeError,
};
use gridcast_registry::{InMemoryRegistryJournal, RegistryJournal};

use super::ApiNode;

/// Build the node for `config`: Postgres when a database URL is configured,
/// otherwise everything in memory.
pub async fn build_node(config: GridcastConfig) -> anyhow::Result<Arc<ApiNode>> {
    let backends = match config.database_url.clone() {
        Some(url) => postgres_backends(&url).await?,
        None => {
            info!("no database configured; state is kept in memory");
            in_memory_backends()
        }
    };
    let node = GridcastNode::assemble(config, backends).context("assembling node")?;
    Ok(Arc::new(node))
}

/// In-memory node (dev runs and tests).
pub fn in_memory_node(config: GridcastConfig) -> Result<Arc<ApiNode>, NodeError> {
    GridcastNode::assemble(config, in_memory_backends()).map(Arc::new)
}

fn in_memory_backends() -> Backends<Arc<dyn RegistryJournal>> {
    Backends {
        journal: Arc::new(InMemoryRegistryJournal::new()),
        records: Arc::new(InMemoryRecordStore::new()),
        drift_history: Arc::new(InMemoryDriftHistory::new()),
        retrain: Arc::new(InMemoryRetrainSink::new()),
        runtime: Arc::new(BaselineRuntime),
    }
}

#[cfg(feature = "postgres")]
async fn postgres_backends(database_url: &str) -> anyhow::Result<Backends<Arc<dyn RegistryJournal>>> {
    use gridcast_infra::postgres::{
        PgBackend, PostgresDriftHistory, PostgresRecordStore, PostgresRegistryJournal, PostgresRetrainQueue,
    };

    let backend = PgBackend::connect(database_url)
        .await
        .context("connecting to postgres")?;
    info!("using postgres persistence");

    Ok(Backends {
        journal: Arc::new(PostgresRegistryJournal::new(backend.clone())),
        records: Arc::new(PostgresRecordStore::new(backend.clone())),
        drift_history: Arc::new(PostgresDriftHistory::new(backend.clone())),
        retrain: Arc::new(PostgresRetrainQueue::new(backend)),
        runtime: Arc::new(BaselineRuntime),
    })
}

#[cfg(not(feature = "postgres"))]
async fn postgres_backends(_database_url: &str) -> anyhow::Result<Backends<Arc<dyn RegistryJournal>>> {
    anyhow::bail!("a database URL is configured but this build lacks the `postgres` feature")
}
