//! User actions: perform the REST call, then report the confirmed change to
//! the engine before the server's broadcast of it can arrive.

use crate::api_client::{ApiClientError, RestClient};
use crate::error::ClientResult;
use async_trait::async_trait;
use docket_cache::{CacheService, LocalMutation, Reconciliation};
use docket_core::{DocumentId, DocumentRecord, DocumentSource, FolderPathKey};

/// Write side of the document REST API.
#[async_trait]
pub trait DocumentMutations: Send + Sync {
    async fn move_document(
        &self,
        source: &FolderPathKey,
        name: &str,
        target: &FolderPathKey,
    ) -> Result<Option<DocumentRecord>, ApiClientError>;

    async fn move_folder(&self, from: &FolderPathKey, to: &FolderPathKey)
        -> Result<(), ApiClientError>;

    async fn delete_document(&self, folder: &FolderPathKey, name: &str)
        -> Result<(), ApiClientError>;

    async fn restore_item(
        &self,
        id: DocumentId,
        target: &FolderPathKey,
    ) -> Result<Option<DocumentRecord>, ApiClientError>;

    async fn rename_document(
        &self,
        folder: &FolderPathKey,
        name: &str,
        new_name: &str,
    ) -> Result<Option<DocumentRecord>, ApiClientError>;

    async fn upload(
        &self,
        folder: &FolderPathKey,
        name: &str,
        contents: Vec<u8>,
    ) -> Result<Option<DocumentRecord>, ApiClientError>;

    async fn create_folder(&self, folder: &FolderPathKey) -> Result<(), ApiClientError>;

    async fn remove_folder(&self, folder: &FolderPathKey) -> Result<(), ApiClientError>;
}

#[async_trait]
impl DocumentMutations for RestClient {
    async fn move_document(
        &self,
        source: &FolderPathKey,
        name: &str,
        target: &FolderPathKey,
    ) -> Result<Option<DocumentRecord>, ApiClientError> {
        RestClient::move_document(self, source, name, target).await
    }

    async fn move_folder(
        &self,
        from: &FolderPathKey,
        to: &FolderPathKey,
    ) -> Result<(), ApiClientError> {
        RestClient::move_folder(self, from, to).await
    }

    async fn delete_document(
        &self,
        folder: &FolderPathKey,
        name: &str,
    ) -> Result<(), ApiClientError> {
        RestClient::delete_document(self, folder, name).await
    }

    async fn restore_item(
        &self,
        id: DocumentId,
        target: &FolderPathKey,
    ) -> Result<Option<DocumentRecord>, ApiClientError> {
        RestClient::restore_item(self, id, target).await
    }

    async fn rename_document(
        &self,
        folder: &FolderPathKey,
        name: &str,
        new_name: &str,
    ) -> Result<Option<DocumentRecord>, ApiClientError> {
        RestClient::rename_document(self, folder, name, new_name).await
    }

    async fn upload(
        &self,
        folder: &FolderPathKey,
        name: &str,
        contents: Vec<u8>,
    ) -> Result<Option<DocumentRecord>, ApiClientError> {
        RestClient::upload(self, folder, name, contents).await
    }

    async fn create_folder(&self, folder: &FolderPathKey) -> Result<(), ApiClientError> {
        RestClient::create_folder(self, folder).await
    }

    async fn remove_folder(&self, folder: &FolderPathKey) -> Result<(), ApiClientError> {
        RestClient::remove_folder(self, folder).await
    }
}

/// Runs user actions against the API and the engine.
///
/// A rejected call is returned to the caller and leaves the engine
/// untouched. The engine is only told about changes the server accepted.
pub struct LocalActions<S, A> {
    service: CacheService<S>,
    api: A,
}

impl<S: DocumentSource, A: DocumentMutations> LocalActions<S, A> {
    pub fn new(service: CacheService<S>, api: A) -> Self {
        Self { service, api }
    }

    pub fn service(&self) -> &CacheService<S> {
        &self.service
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn move_document(
        &self,
        source: &FolderPathKey,
        name: &str,
        target: &FolderPathKey,
    ) -> ClientResult<Reconciliation> {
        let record = self.api.move_document(source, name, target).await?;
        self.confirm(LocalMutation::Move {
            source: source.clone(),
            target: target.clone(),
            name: name.to_string(),
            record,
        })
    }

    pub async fn move_folder(
        &self,
        from: &FolderPathKey,
        to: &FolderPathKey,
    ) -> ClientResult<Reconciliation> {
        self.api.move_folder(from, to).await?;
        self.confirm(LocalMutation::MoveFolder {
            from: from.clone(),
            to: to.clone(),
        })
    }

    pub async fn delete_document(
        &self,
        folder: &FolderPathKey,
        name: &str,
        id: Option<DocumentId>,
    ) -> ClientResult<Reconciliation> {
        self.api.delete_document(folder, name).await?;
        self.confirm(LocalMutation::Delete {
            folder: folder.clone(),
            name: name.to_string(),
            id,
        })
    }

    pub async fn restore(
        &self,
        id: DocumentId,
        name: &str,
        target: &FolderPathKey,
    ) -> ClientResult<Reconciliation> {
        let record = self.api.restore_item(id, target).await?;
        let name = record
            .as_ref()
            .map(|r| r.name.clone())
            .unwrap_or_else(|| name.to_string());
        self.confirm(LocalMutation::Restore {
            folder: target.clone(),
            name,
            record,
        })
    }

    pub async fn rename(
        &self,
        folder: &FolderPathKey,
        from: &str,
        to: &str,
    ) -> ClientResult<Reconciliation> {
        self.api.rename_document(folder, from, to).await?;
        self.confirm(LocalMutation::Rename {
            folder: folder.clone(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Upload a file. The upload is announced before the request so the
    /// server's add event is not mistaken for a move echo.
    pub async fn upload(
        &self,
        folder: &FolderPathKey,
        name: &str,
        contents: Vec<u8>,
    ) -> ClientResult<Reconciliation> {
        self.confirm(LocalMutation::Upload {
            folder: folder.clone(),
            name: name.to_string(),
            record: None,
        })?;
        let record = self.api.upload(folder, name, contents).await?;
        self.confirm(LocalMutation::Upload {
            folder: folder.clone(),
            name: name.to_string(),
            record,
        })
    }

    pub async fn create_folder(&self, folder: &FolderPathKey) -> ClientResult<Reconciliation> {
        self.api.create_folder(folder).await?;
        self.confirm(LocalMutation::CreateFolder {
            folder: folder.clone(),
        })
    }

    pub async fn remove_folder(&self, folder: &FolderPathKey) -> ClientResult<Reconciliation> {
        self.api.remove_folder(folder).await?;
        self.confirm(LocalMutation::RemoveFolder {
            folder: folder.clone(),
        })
    }

    fn confirm(&self, mutation: LocalMutation) -> ClientResult<Reconciliation> {
        let result = self.service.notify_local_mutation(&mutation)?;
        tracing::info!(
            action = mutation.label(),
            outcome = ?result.outcome,
            "Local action confirmed"
        );
        Ok(result)
    }
}
