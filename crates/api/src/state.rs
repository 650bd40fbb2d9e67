use std::sync::Arc;
use study_control::ControlPlane;
use study_metrics::MetricsService;
use study_models::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub control: Arc<ControlPlane>,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    /// State sharing the control plane's config and metrics.
    pub fn new(control: Arc<ControlPlane>) -> Self {
        Self {
            config: control.config().clone(),
            metrics: control.metrics(),
            control,
        }
    }
}
