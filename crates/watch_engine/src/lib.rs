//! Portal watch engine: login, page loading, extraction, snapshots, mail and
//! the cycle that ties them together.
mod decode;
mod extract;
mod fetch;
mod links;
mod mailer;
mod notify;
mod orchestrator;
mod persist;
mod session;
mod store;
mod types;

pub use decode::decode_markup;
pub use extract::{
    Extraction, ExtractionWarning, PortalExtractor, DEFAULT_BASE_URL, JOBS_REGION,
    NOTIFICATIONS_REGION,
};
pub use fetch::{ContentFetcher, FetchSettings, PortalFetcher};
pub use links::resolve_link;
pub use mailer::{service_host, SmtpMailer, SmtpSettings};
pub use notify::{Delivery, MailTransport, Notifier};
pub use orchestrator::{Clock, CycleSettings, Orchestrator};
pub use persist::{ensure_data_dir, AtomicFileWriter, PersistError};
pub use session::{HttpSessionProvider, LoginSettings, PortalSession, SessionProvider};
pub use store::{JsonSnapshotStore, SnapshotStore};
pub use types::{AuthError, CycleError, FailureKind, FetchError, TransportError};
