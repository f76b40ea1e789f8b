use std::sync::Arc;

use crate::config::Config;
use crate::sync::Synchronizer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sync: Arc<Synchronizer>,
}

impl AppState {
    pub fn new(config: Config, sync: Arc<Synchronizer>) -> Self {
        Self {
            config: Arc::new(config),
            sync,
        }
    }
}
