use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use std::sync::Arc;
use std::time::Duration;

use crate::utility::logger::Logger;
use crate::utility::mixed::BoxedFuture;
use crate::utility::sweeper::Sweeper;


/// Runs the verification and inactivity sweeps every `interval`, starting
/// immediately, until `shutdown` flips to `true` or its sender goes away.
pub fn periodic_sweeps(sweeper: Arc<Sweeper>,
                       interval: Duration,
                       mut shutdown: watch::Receiver<bool>
) -> BoxedFuture<'static, ()> {
    Box::pin(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {},
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        Logger::info("Periodic sweeps stopped");
                        return;
                    }
                },
            }
            if *shutdown.borrow() {
                Logger::info("Periodic sweeps stopped");
                return;
            }

            let now = Utc::now();
            Logger::info("Starting verification sweep");
            let report = sweeper.run_verification(now, &shutdown).await;
            Logger::info_long("Verification sweep finished", &report.summary());

            Logger::info("Starting inactivity sweep");
            let report = sweeper.run_inactivity(now, &shutdown).await;
            Logger::info_long("Inactivity sweep finished", &report.summary());
        }
    })
}
