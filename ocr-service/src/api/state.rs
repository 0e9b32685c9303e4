use std::sync::Arc;

use crate::config::Config;
use crate::ocr::ModelManager;
use crate::services::RecognitionService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub models: Arc<ModelManager>,
    pub recognition: RecognitionService,
}

impl AppState {
    pub fn new(config: Config, models: Arc<ModelManager>) -> Self {
        let recognition = RecognitionService::new(&config, Arc::clone(&models));
        Self {
            config: Arc::new(config),
            models,
            recognition,
        }
    }
}
