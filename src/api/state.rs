//! Shared application state handed to every handler and middleware through
//! axum's `State` extractor, the same role the teacher's `PgPool` state
//! plays in `build_router`, generalized to carry the whole service set
//! instead of a bare pool.

use std::sync::Arc;

use crate::config::Config;
use crate::domain::Clock;
use crate::events::EventService;
use crate::identity::IdentityAdapter;
use crate::registration::RegistrationEngine;
use crate::stats::StatsService;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
    pub engine: Arc<RegistrationEngine>,
    pub events: Arc<EventService>,
    pub stats: Arc<StatsService>,
    pub identity: Arc<IdentityAdapter>,
}

impl AppState {
    pub fn new(store: Store, clock: Arc<dyn Clock>, config: Arc<Config>) -> Self {
        let engine = Arc::new(RegistrationEngine::new(store.clone(), clock.clone()));
        let events = Arc::new(EventService::new(store.clone(), clock.clone(), config.clone()));
        let stats = Arc::new(StatsService::new(store.clone(), clock.clone()));
        let identity = Arc::new(IdentityAdapter::new(store.clone()));

        Self {
            store,
            clock,
            config,
            engine,
            events,
            stats,
            identity,
        }
    }
}
