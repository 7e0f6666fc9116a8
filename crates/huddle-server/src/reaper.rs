use std::time::Duration;

use crate::state::AppState;

/// Background task that periodically removes vacant rooms whose state has
/// outlived the retention window. Occupied rooms are never touched.
pub fn spawn_room_reaper(state: AppState) {
    let retention = Duration::from_secs(state.config.rooms.retention_secs);
    let sweep_interval = Duration::from_secs(state.config.rooms.sweep_interval_secs);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so a fresh boot does
        // not log an empty sweep
        interval.tick().await;

        loop {
            interval.tick().await;
            let estimation = state.estimation.write().await.reap_idle(retention);
            let retro = state.retro.write().await.reap_idle(retention);
            let breakout = state.breakout.write().await.reap_idle(retention);
            let removed = estimation + retro + breakout;
            if removed > 0 {
                tracing::info!(estimation, retro, breakout, "Reaped idle rooms");
            }
        }
    });
}
