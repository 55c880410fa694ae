//! Application state.

use std::sync::Arc;

use rboard_ai::{image_capability_from_env, GeminiText, ImageCapability, TextCapability};
use rboard_jobs::JobRegistry;
use rboard_store::{LocalMediaStore, MediaStore};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub text: Arc<dyn TextCapability>,
    pub image: Arc<dyn ImageCapability>,
    pub store: Arc<dyn MediaStore>,
    pub jobs: Arc<JobRegistry>,
}

impl AppState {
    /// Create application state from the environment.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let text: Arc<dyn TextCapability> = Arc::new(GeminiText::from_env()?);
        let image = image_capability_from_env()?;
        let store: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::from_env()?);
        let jobs = Arc::new(JobRegistry::from_env());

        Ok(Self {
            config,
            text,
            image,
            store,
            jobs,
        })
    }

    /// Assemble state from explicit components (used by tests).
    pub fn with_components(
        config: ApiConfig,
        text: Arc<dyn TextCapability>,
        image: Arc<dyn ImageCapability>,
        store: Arc<dyn MediaStore>,
        jobs: Arc<JobRegistry>,
    ) -> Self {
        Self {
            config,
            text,
            image,
            store,
            jobs,
        }
    }
}
