use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::converter::Converter;
use crate::lifecycle::RequestBudget;
use crate::upload::UploadLimits;

/// Shared, read-only handler state.
///
/// The converter slot is written once: empty while the process is starting,
/// filled when it is ready. There is no way back to empty.
#[derive(Clone)]
pub struct AppState {
    converter: Arc<OnceCell<Arc<dyn Converter>>>,
    pub(crate) permits: Arc<Semaphore>,
    pub(crate) limits: UploadLimits,
    pub(crate) request_timeout: Duration,
    pub(crate) budget: Option<Arc<RequestBudget>>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        AppState {
            converter: Arc::new(OnceCell::new()),
            permits: Arc::new(Semaphore::new(config.workers)),
            limits: UploadLimits::from_config(config),
            request_timeout: config.request_timeout,
            budget: None,
        }
    }

    pub fn with_converter(self, converter: Arc<dyn Converter>) -> Self {
        self.install_converter(converter);
        self
    }

    pub fn with_budget(mut self, budget: Option<Arc<RequestBudget>>) -> Self {
        self.budget = budget;
        self
    }

    /// Returns false if a converter was already installed.
    pub fn install_converter(&self, converter: Arc<dyn Converter>) -> bool {
        self.converter.set(converter).is_ok()
    }

    pub fn converter(&self) -> Option<Arc<dyn Converter>> {
        self.converter.get().cloned()
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }
}
