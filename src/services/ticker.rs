//! Periodic tick broadcaster. Wakes up the hosts group once per period;
//! each host endpoint turns the signal into a tick event on its session
//! controller, so every session advances once per period.

use crate::services::game::event::ServerEvent;
use crate::services::groups::{Groups, HOSTS_GROUP};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// Runs forever, broadcasting the tick signal to the hosts group.
/// Spawned once at startup.
pub async fn run(groups: Arc<Groups>, period_secs: u64) {
    let period = Duration::from_secs(period_secs.max(1));
    debug!("Tick broadcaster running (period: {:?})", period);

    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        groups.publish(HOSTS_GROUP, Arc::new(ServerEvent::tick()));
    }
}
