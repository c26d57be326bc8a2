//! In-process session for resolver tests

use async_trait::async_trait;

use crate::backend::config::BackendConfig;
use crate::backend::error::BackendSessionError;
use crate::backend::file_manager::FileManager;
use crate::backend::session::BackendSessionTrait;
use crate::lsp::testing::MockLspClient;

/// Session backed by a [`MockLspClient`] instead of a server process
pub struct MockBackendSession {
    config: BackendConfig,
    client: MockLspClient,
    file_manager: FileManager,
}

impl MockBackendSession {
    pub fn new(config: BackendConfig, client: MockLspClient) -> Self {
        Self {
            config,
            client,
            file_manager: FileManager::new(),
        }
    }

    pub fn client(&self) -> &MockLspClient {
        &self.client
    }

    pub fn file_manager(&self) -> &FileManager {
        &self.file_manager
    }
}

#[async_trait]
impl BackendSessionTrait for MockBackendSession {
    type Client = MockLspClient;

    fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn client_mut(&mut self) -> &mut Self::Client {
        &mut self.client
    }

    fn documents_mut(&mut self) -> (&mut FileManager, &mut Self::Client) {
        (&mut self.file_manager, &mut self.client)
    }

    async fn close(mut self) -> Result<(), BackendSessionError> {
        self.file_manager.close_all_files(&mut self.client).await;
        Ok(())
    }
}
