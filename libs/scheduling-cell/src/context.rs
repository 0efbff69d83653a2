use std::sync::Arc;

use async_trait::async_trait;

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::preferences::PreferenceStore;

use crate::services::SchedulingStore;

/// Process state the calendar routes read from.
///
/// Implemented by the application context so every route shares the signed-in
/// session's store and one preference file handle.
#[async_trait]
pub trait SchedulingContext: Send + Sync {
    fn config(&self) -> Arc<AppConfig>;

    fn preferences(&self) -> &PreferenceStore;

    /// The live store of the session that owns `access_token`.
    async fn scheduling_store(&self, access_token: &str) -> Result<Arc<SchedulingStore>, AppError>;
}
