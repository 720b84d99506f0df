use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use watch_core::{
    diff_new, plan_notifications, CycleMode, CycleOutcome, CycleStage, EventKind, JobRecord,
    NotificationRecord, RecordKind, ReportEntries,
};
use watch_logging::{watch_debug, watch_error, watch_info, watch_warn};

use crate::extract::PortalExtractor;
use crate::fetch::ContentFetcher;
use crate::notify::{Delivery, MailTransport, Notifier};
use crate::session::SessionProvider;
use crate::store::SnapshotStore;
use crate::CycleError;

/// Timestamp source for report footers.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct CycleSettings {
    pub target_url: String,
    pub clock: Clock,
}

impl CycleSettings {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            clock: Arc::new(|| "unknown".to_string()),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

/// Runs check cycles: login, fetch, extract, diff, notify, persist.
///
/// A cycle either completes or is abandoned as a whole; nothing carries over
/// from one cycle to the next except the persisted snapshots.
pub struct Orchestrator<P, F, S, T> {
    provider: P,
    fetcher: F,
    extractor: PortalExtractor,
    store: S,
    notifier: Notifier<T>,
    settings: CycleSettings,
    cycles: AtomicU64,
}

impl<P, F, S, T> Orchestrator<P, F, S, T>
where
    P: SessionProvider,
    F: ContentFetcher<P::Session>,
    S: SnapshotStore,
    T: MailTransport,
{
    pub fn new(
        provider: P,
        fetcher: F,
        extractor: PortalExtractor,
        store: S,
        notifier: Notifier<T>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            provider,
            fetcher,
            extractor,
            store,
            notifier,
            settings,
            cycles: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of cycles started so far.
    pub fn cycles_run(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub async fn run_cycle(&self, mode: CycleMode) -> Result<CycleOutcome, CycleError> {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let mut stage = CycleStage::Idle;
        watch_info!("Cycle {} started ({})", cycle, mode);

        advance(cycle, &mut stage);
        let markup = {
            let session = self.provider.authenticate().await?;
            advance(cycle, &mut stage);
            self.fetcher
                .fetch(&session, &self.settings.target_url)
                .await?
        };

        advance(cycle, &mut stage);
        let extraction = self.extractor.extract(&markup);
        let jobs = extraction.jobs;
        let notifications = extraction.notifications;
        watch_info!(
            "Scraped {} job(s) and {} notification(s)",
            jobs.len(),
            notifications.len()
        );

        advance(cycle, &mut stage);
        let (new_jobs, new_notifications) = match mode {
            CycleMode::Bootstrap => (jobs.clone(), notifications.clone()),
            CycleMode::Incremental => {
                let previous_jobs = self
                    .store
                    .read::<JobRecord>()
                    .map_err(CycleError::SnapshotRead)?;
                let previous_notifications = self
                    .store
                    .read::<NotificationRecord>()
                    .map_err(CycleError::SnapshotRead)?;
                (
                    diff_new(&previous_jobs, &jobs),
                    diff_new(&previous_notifications, &notifications),
                )
            }
        };
        watch_info!(
            "Found {} new job(s) and {} new notification(s)",
            new_jobs.len(),
            new_notifications.len()
        );

        advance(cycle, &mut stage);
        let checked_utc = (self.settings.clock)();
        let plan = plan_notifications(mode, new_jobs.len(), new_notifications.len());
        let mut delivery_failures = 0;
        for &kind in &plan {
            let entries = match kind {
                EventKind::NewJobs => ReportEntries {
                    jobs: &new_jobs,
                    ..ReportEntries::default()
                },
                EventKind::NewNotifications => ReportEntries {
                    notifications: &new_notifications,
                    ..ReportEntries::default()
                },
                EventKind::InitialScrape => ReportEntries {
                    jobs: &new_jobs,
                    notifications: &new_notifications,
                },
                EventKind::NoUpdates => ReportEntries::default(),
            };
            if self.notifier.notify(kind, entries, &checked_utc).await == Delivery::Failed {
                delivery_failures += 1;
            }
        }

        advance(cycle, &mut stage);
        // The second write still runs when the first one fails.
        let jobs_written = self.store.write(&jobs);
        let notifications_written = self.store.write(&notifications);
        if let Err(err) = &jobs_written {
            watch_error!("Could not save {} snapshot: {}", RecordKind::Job, err);
        }
        if let Err(err) = &notifications_written {
            watch_error!(
                "Could not save {} snapshot: {}",
                RecordKind::Notification,
                err
            );
        }
        jobs_written
            .and(notifications_written)
            .map_err(CycleError::SnapshotWrite)?;

        advance(cycle, &mut stage);
        watch_info!("Cycle {} finished", cycle);
        Ok(CycleOutcome {
            mode,
            total_jobs: jobs.len(),
            total_notifications: notifications.len(),
            new_jobs: new_jobs.len(),
            new_notifications: new_notifications.len(),
            dispatched: plan,
            delivery_failures,
        })
    }

    /// Runs one cycle and logs its failure instead of returning it.
    pub async fn run_logged(&self, mode: CycleMode) -> Option<CycleOutcome> {
        match self.run_cycle(mode).await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                watch_error!("Cycle failed while {}: {}", err.stage(), err);
                None
            }
        }
    }

    /// Runs an incremental cycle now and then once per `period` until
    /// `shutdown` resolves. Shutdown is only observed between cycles.
    pub async fn run_forever<Fut>(&self, period: Duration, shutdown: Fut)
    where
        Fut: Future<Output = ()>,
    {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    watch_info!("Shutdown requested; stopping after {} cycle(s)", self.cycles_run());
                    return;
                }
                _ = ticker.tick() => {}
            }
            if self.run_logged(CycleMode::Incremental).await.is_none() {
                watch_warn!("Retrying at the next interval ({:?})", period);
            }
        }
    }
}

fn advance(cycle: u64, stage: &mut CycleStage) {
    *stage = stage.next();
    watch_debug!("Cycle {}: {}", cycle, stage);
}
