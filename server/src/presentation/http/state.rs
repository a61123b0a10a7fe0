//! Shared HTTP application state.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::application::{JobQueue, LibraryScanner, Scheduler, TranslationPipeline};
use crate::domain::repositories::PersistenceStore;
use crate::shared::settings::SettingsStore;

/// Cloned into every handler; every field is reference-counted so cloning
/// is cheap and handlers never need a second extractor type (teacher's
/// per-repository `FromRef` impls collapse into one `State<AppState>`
/// since this daemon has one cohesive service graph, not a dozen
/// independently substitutable repositories).
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<JobQueue>,
    pub scanner: Arc<LibraryScanner>,
    pub scheduler: Arc<Scheduler>,
    pub pipeline: Arc<TranslationPipeline>,
    pub store: Arc<dyn PersistenceStore>,
    pub settings: Arc<SettingsStore>,
    pub ui_static_dir: Option<PathBuf>,
    /// Cancelled on shutdown; re-derived as a child token each time the
    /// scheduler re-registers its cron entry on a settings update.
    pub cancellation: CancellationToken,
}
