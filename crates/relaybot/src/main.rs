use std::sync::Arc;

use tracing::{info, warn};

use relaybot_core::{
    config::{Config, StoreBackend},
    memory::InMemoryCodeRepository,
    ports::CodeRepository,
    purge::PurgeTask,
    redeem::CodeStore,
};
use relaybot_mongo::{MongoCodeRepository, StoredClock};

async fn open_repository(
    store: &StoreBackend,
) -> Result<Arc<dyn CodeRepository>, relaybot_core::Error> {
    match store {
        StoreBackend::Mongo {
            uri,
            database,
            time_offset_minutes,
        } => {
            let clock = StoredClock::with_offset_minutes(*time_offset_minutes);
            let repo = MongoCodeRepository::connect(uri, database, clock).await?;
            if let Err(e) = repo.ensure_indexes().await {
                warn!(error = %e, "failed to create indexes");
            }
            Ok(Arc::new(repo))
        }
        StoreBackend::Memory => {
            warn!("using in-memory store; codes and premium records are lost on restart");
            Ok(Arc::new(InMemoryCodeRepository::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), relaybot_core::Error> {
    relaybot_core::logging::init("relaybot")?;

    let cfg = Arc::new(Config::load()?);
    let store = CodeStore::new(open_repository(&cfg.store).await?);

    let purge = PurgeTask::start(store.clone(), cfg.purge_interval);

    let res = relaybot_telegram::router::run_polling(cfg, store).await;
    purge.stop().await;
    info!("shutdown complete");

    res.map_err(|e| relaybot_core::Error::External(format!("telegram bot failed: {e}")))
}
