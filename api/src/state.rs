use std::sync::Arc;

use common::channels::WebPushSender;
use common::config::Settings;
use common::db::DbPool;
use common::extraction::ImageExtractor;
use common::notifications::NotificationService;
use metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub config: Arc<Settings>,
    pub notification_service: Arc<NotificationService>,
    pub push_sender: Arc<WebPushSender>,
    pub extractor: Arc<dyn ImageExtractor>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Create a new AppState instance
    pub fn new(
        db_pool: DbPool,
        config: Settings,
        notification_service: Arc<NotificationService>,
        push_sender: Arc<WebPushSender>,
        extractor: Arc<dyn ImageExtractor>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            db_pool,
            config: Arc::new(config),
            notification_service,
            push_sender,
            extractor,
            metrics_handle,
        }
    }
}
