//! Wiring for a running client.
//!
//! `Cinelist` opens persisted state once and builds the components in
//! dependency order: storage, session signal, gateway (reading the
//! signal), session manager (probing through the gateway), wishlist.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::api::CatalogGateway;
use crate::auth::{SessionManager, SessionSignal, SessionView};
use crate::config::Config;
use crate::router::{self, Navigator, Route};
use crate::storage::{FileStore, KeyValueStore};
use crate::wishlist::WishlistStore;

pub struct Cinelist {
    pub config: Config,
    pub gateway: Arc<CatalogGateway>,
    pub session: SessionManager<Arc<CatalogGateway>>,
    pub wishlist: WishlistStore,
}

impl Cinelist {
    /// Open the file-backed store under the configured data directory.
    pub fn open(config: Config, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let data_dir = config.data_dir()?;
        debug!(?data_dir, "Data directory configured");
        let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&data_dir)?);
        Self::with_store(config, kv, navigator)
    }

    pub fn with_store(
        config: Config,
        kv: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let signal = SessionSignal::hydrate(kv.as_ref())?;
        let gateway = Arc::new(CatalogGateway::new(&config, Arc::new(signal.view()))?);
        let session = SessionManager::new(kv.clone(), signal, gateway.clone(), navigator);
        let wishlist = WishlistStore::open(kv)?;

        Ok(Self {
            config,
            gateway,
            session,
            wishlist,
        })
    }

    pub fn session_view(&self) -> SessionView {
        self.session.view()
    }

    /// Apply the sign-in guard to a requested route.
    pub fn resolve_route(&self, target: Route) -> Route {
        router::guard(target, &self.session.view())
    }
}
