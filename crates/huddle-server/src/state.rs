use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::RwLock;

use crate::breakout::BreakoutEngine;
use crate::config::HuddleConfig;
use crate::estimation::EstimationEngine;
use crate::registry::ConnId;
use crate::retro::RetroEngine;

pub type SharedEstimation = Arc<RwLock<EstimationEngine>>;
pub type SharedRetro = Arc<RwLock<RetroEngine>>;
pub type SharedBreakout = Arc<RwLock<BreakoutEngine>>;

#[derive(Clone)]
pub struct AppState {
    pub estimation: SharedEstimation,
    pub retro: SharedRetro,
    pub breakout: SharedBreakout,
    pub config: Arc<HuddleConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    next_conn_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: HuddleConfig) -> Self {
        Self {
            estimation: Arc::new(RwLock::new(EstimationEngine::new())),
            retro: Arc::new(RwLock::new(RetroEngine::new())),
            breakout: Arc::new(RwLock::new(BreakoutEngine::new())),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            next_conn_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn alloc_conn_id(&self) -> ConnId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Decrements the live-connection count when a socket handler exits, on
/// any path.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}
