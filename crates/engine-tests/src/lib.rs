#![allow(dead_code)]

use engine_config::SyncSettings;
use engine_core::remote::memory::InMemoryTransformationService;
use engine_processing::client::TransformationClient;
use std::sync::Arc;

pub mod utils;

/// Default settings with retry sleeps disabled.
pub fn test_settings() -> SyncSettings {
    SyncSettings {
        retry_base_delay_ms: 0,
        retry_max_delay_ms: 0,
        ..Default::default()
    }
}

/// An in-memory service and a client talking to it.
pub struct Harness {
    pub service: Arc<InMemoryTransformationService>,
    pub client: TransformationClient,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: SyncSettings) -> Self {
        let service = Arc::new(InMemoryTransformationService::new());
        let client = TransformationClient::new(service.clone(), settings);
        Self { service, client }
    }

    pub fn from_service(service: InMemoryTransformationService, settings: SyncSettings) -> Self {
        let service = Arc::new(service);
        let client = TransformationClient::new(service.clone(), settings);
        Self { service, client }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
