//! Background tasks spawned by [`SyncEngine::start`].

use std::sync::atomic::Ordering;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{SyncEngine, Trigger};
use crate::events::SyncEvent;
use crate::models::EngineState;

/// Run automatic cycles on every tick and on every wake-up request
pub(super) async fn tick_loop(engine: SyncEngine, mut shutdown: watch::Receiver<bool>) {
    let period = engine.inner.config.sync_interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {
                tracing::trace!("Sync tick");
            }
            () = engine.inner.wake.notified() => {
                tracing::trace!("Sync requested");
            }
        }
        engine.run_cycle(Trigger::Automatic).await;
    }
    tracing::debug!("Sync tick loop stopped");
}

/// Follow the network gate and react to transitions
pub(super) async fn network_loop(
    engine: SyncEngine,
    mut shutdown: watch::Receiver<bool>,
    mut online_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = online_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let online = *online_rx.borrow_and_update();
                handle_transition(&engine, online);
            }
        }
    }
    tracing::debug!("Network watcher stopped");
}

fn handle_transition(engine: &SyncEngine, online: bool) {
    engine
        .inner
        .events
        .emit(SyncEvent::OnlineStatusChanged { online });

    if !online {
        engine.set_state(EngineState::Offline);
        return;
    }

    // A running cycle settles the state itself when it finishes
    if !engine.inner.syncing.load(Ordering::SeqCst) {
        engine.set_state(engine.resting_state());
    }
    engine.wake_scheduler();
}
