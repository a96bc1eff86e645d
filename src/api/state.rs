use std::sync::Arc;

use crate::config::Config;
use crate::control::ExitController;
use crate::observability::Metrics;
use crate::remote::RemoteClient;
use crate::storage::PathStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<PathStore>,
    pub remote: Arc<RemoteClient>,
    pub exit: ExitController,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, store: PathStore, remote: RemoteClient, exit: ExitController) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            remote: Arc::new(remote),
            exit,
            metrics: Arc::new(Metrics::new()),
        }
    }
}
