mod errors;
mod http;

pub use errors::RemoteError;
pub use http::HttpRemoteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const NOTE_MIME_TYPE: &str = "application/json";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    pub mime_type: String,
}

/// Narrow, vendor-agnostic view of the cloud storage API: folders as
/// containers, files as blobs with metadata, bearer-token auth. The
/// adapter never retries; retry policy belongs to the sync layer.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Sequential calls converge on a single folder. Concurrent racing
    /// calls may still create duplicates; the listing reconciles those by
    /// returning the lexicographically-first id.
    async fn find_or_create_folder(
        &self,
        token: &str,
        name: &str,
    ) -> Result<String, RemoteError>;

    async fn list_files(
        &self,
        token: &str,
        folder_id: &str,
    ) -> Result<Vec<RemoteFile>, RemoteError>;

    async fn create_file(
        &self,
        token: &str,
        metadata: &FileMetadata,
        body: &str,
    ) -> Result<RemoteFile, RemoteError>;

    async fn update_file(
        &self,
        token: &str,
        id: &str,
        body: &str,
    ) -> Result<(), RemoteError>;

    async fn delete_file(
        &self,
        token: &str,
        id: &str,
    ) -> Result<(), RemoteError>;

    async fn file_content(
        &self,
        token: &str,
        id: &str,
    ) -> Result<String, RemoteError>;
}
