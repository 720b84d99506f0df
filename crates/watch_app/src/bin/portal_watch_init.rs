use anyhow::{Context, Result};
use watch_core::CycleMode;
use watch_logging::{watch_error, watch_info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = watch_app::start("portal_watch_init")?;
    let orchestrator = watch_app::build_orchestrator(&settings)?;

    let outcome = match orchestrator.run_cycle(CycleMode::Bootstrap).await {
        Ok(outcome) => outcome,
        Err(err) => {
            watch_error!("Initialization failed while {}: {}", err.stage(), err);
            return Err(err).context("initial scrape failed");
        }
    };
    watch_info!(
        "Initialization complete: stored {} job(s) and {} notification(s) in {:?}",
        outcome.total_jobs,
        outcome.total_notifications,
        settings.data_dir
    );
    Ok(())
}
