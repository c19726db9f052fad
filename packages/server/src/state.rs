use crate::config::AppConfig;
use crate::lifecycle::Lifecycle;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub lifecycle: Lifecycle,
}
