//! Dashboard view: live traffic statistics
//!
//! Polled while the Dashboard tab is active. Each successful cycle replaces
//! the stats and QPS snapshots wholesale.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use crate::api::Api;
use crate::error::RequestError;
use crate::models::{BlockDomain, QpsSeries, StatsSnapshot};

pub const STATS_PATH: &str = "/api/stats";
pub const QPS_PATH: &str = "/api/qps";
pub const BLOCK_PATH: &str = "/api/block";

pub struct StatsView {
    api: Api,
    stats: RwLock<Arc<StatsSnapshot>>,
    qps: RwLock<Arc<QpsSeries>>,
}

impl StatsView {
    pub fn new(api: Api) -> Arc<Self> {
        Arc::new(Self {
            api,
            stats: RwLock::new(Arc::new(StatsSnapshot::default())),
            qps: RwLock::new(Arc::new(QpsSeries::default())),
        })
    }

    /// One poll cycle: stats, then QPS. A stats failure skips QPS.
    pub async fn refresh(&self) -> Result<(), RequestError> {
        let stats: StatsSnapshot = self.api.get(STATS_PATH).await?;
        debug!(
            "Stats: total={} blocked={} top={}",
            stats.total_requests,
            stats.blocked,
            stats.top_domains.len()
        );
        *self.stats.write() = Arc::new(stats);

        let qps: QpsSeries = self.api.get(QPS_PATH).await?;
        *self.qps.write() = Arc::new(qps);
        Ok(())
    }

    /// Add one domain to the server's block set, then refresh
    pub async fn block_domain(&self, domain: impl Into<String>) -> Result<(), RequestError> {
        let domain = domain.into();
        self.api
            .post(BLOCK_PATH, &BlockDomain {
                domain: domain.clone(),
            })
            .await?;
        info!("Blocked domain {}", domain);
        self.refresh().await
    }

    pub fn stats(&self) -> Arc<StatsSnapshot> {
        self.stats.read().clone()
    }

    pub fn qps(&self) -> Arc<QpsSeries> {
        self.qps.read().clone()
    }
}

/// Poll action bound to a view that may be torn down.
///
/// Once the view is gone the cycle is a no-op, so late ticks never touch
/// a dropped view.
pub(crate) async fn refresh_if_alive(view: Weak<StatsView>) -> Result<(), RequestError> {
    match view.upgrade() {
        Some(view) => view.refresh().await,
        None => Ok(()),
    }
}
