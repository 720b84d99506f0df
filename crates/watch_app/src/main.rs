use anyhow::Result;
use watch_logging::{watch_error, watch_info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = watch_app::start("portal_watch")?;
    let orchestrator = watch_app::build_orchestrator(&settings)?;

    watch_info!(
        "Watching {} every {} minute(s); press Ctrl-C to stop",
        settings.target_url,
        settings.check_interval.as_secs() / 60
    );
    orchestrator
        .run_forever(settings.check_interval, shutdown_signal())
        .await;
    watch_info!("portal_watch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        watch_error!("Cannot listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
}
