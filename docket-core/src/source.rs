//! Network collaborator trait consumed by the cache engine.

use crate::error::FetchError;
use crate::{DocumentId, DocumentRecord, FolderNode, FolderPathKey};
use async_trait::async_trait;

/// Read side of the document REST API.
///
/// The engine only ever reads through this trait; mutations are performed by
/// the client and reported back as local mutations. Implementations must be
/// cheap to share across tasks.
#[async_trait]
pub trait DocumentSource: Send + Sync + 'static {
    /// Fetch the whole folder tree.
    async fn fetch_folder_tree(&self) -> Result<Vec<FolderNode>, FetchError>;

    /// Fetch the authoritative listing of one folder.
    async fn fetch_documents(
        &self,
        folder: &FolderPathKey,
    ) -> Result<Vec<DocumentRecord>, FetchError>;

    /// Refresh thumbnails for documents already on screen.
    ///
    /// Never changes the listing itself.
    async fn refresh_thumbnails(
        &self,
        folder: &FolderPathKey,
        documents: &[DocumentId],
    ) -> Result<(), FetchError>;
}
