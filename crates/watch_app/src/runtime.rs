use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use watch_engine::{
    CycleSettings, FetchSettings, HttpSessionProvider, JsonSnapshotStore, LoginSettings, Notifier,
    Orchestrator, PortalExtractor, PortalFetcher, SmtpMailer,
};
use watch_logging::{watch_info, watch_warn};

use crate::config::Settings;

pub type PortalOrchestrator =
    Orchestrator<HttpSessionProvider, PortalFetcher, JsonSnapshotStore, Option<SmtpMailer>>;

/// Loads `.env` (if present) and the settings, then starts logging.
pub fn start(program: &str) -> anyhow::Result<Settings> {
    let env_file = match dotenvy::dotenv() {
        Ok(path) => Some(path),
        Err(err) if err.not_found() => None,
        Err(err) => return Err(err).context("failed to read .env file"),
    };
    let settings = Settings::from_env().context("invalid configuration")?;

    watch_logging::initialize(&settings.log);
    watch_info!("{} {} starting", program, env!("CARGO_PKG_VERSION"));
    if let Some(path) = env_file {
        watch_info!("Loaded environment from {:?}", path);
    }
    for warning in &settings.warnings {
        watch_warn!("{warning}");
    }
    if let Some(path) = &settings.browser_executable {
        watch_warn!(
            "Browser executable {:?} is ignored; the portal is read over plain HTTP",
            path
        );
    }
    if !settings.browser_headless {
        watch_warn!("Headed browser mode is not available; running headless");
    }
    Ok(settings)
}

pub fn build_orchestrator(settings: &Settings) -> anyhow::Result<PortalOrchestrator> {
    let mut login = LoginSettings::new(
        settings.login_url.clone(),
        settings.username.clone(),
        settings.password.clone(),
    );
    login.timeout = settings.wait_timeout;

    let fetcher = PortalFetcher::new(FetchSettings {
        wait_timeout: settings.wait_timeout,
        ..FetchSettings::default()
    });
    let mailer = match &settings.smtp {
        Some(smtp) => Some(SmtpMailer::new(smtp).context("invalid mail settings")?),
        None => None,
    };

    Ok(Orchestrator::new(
        HttpSessionProvider::new(login),
        fetcher,
        PortalExtractor::new(Some(settings.base_url.clone())),
        JsonSnapshotStore::new(settings.data_dir.clone()),
        Notifier::new(mailer, settings.recipients.clone()),
        CycleSettings::new(settings.target_url.clone())
            .with_clock(Arc::new(|| Utc::now().to_rfc3339())),
    ))
}
