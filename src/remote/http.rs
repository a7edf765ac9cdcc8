use log::warn;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::remote::{FileMetadata, FOLDER_MIME_TYPE, RemoteError, RemoteFile, RemoteStore};
use crate::rng::make_uuid;

use async_trait::async_trait;

const LIST_FIELDS: &str = "files(id,name,parents,createdTime,mimeType)";
const FILE_FIELDS: &str = "id,name,parents,createdTime,mimeType";
const PAGE_SIZE: &str = "1000";

pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

impl HttpRemoteStore {
    pub fn new(config: &AppConfig) -> Result<HttpRemoteStore, RemoteError> {
        Ok(
            HttpRemoteStore {
                client: Client::builder()
                    .timeout(config.request_timeout())
                    .build()?,
                base_url: config.api_base_url.trim_end_matches('/').to_owned(),
                upload_url: config.api_upload_url
                    .trim_end_matches('/')
                    .to_owned(),
            }
        )
    }

    async fn query_files(
        &self,
        token: &str,
        query: &str,
    ) -> Result<Vec<RemoteFile>, RemoteError> {
        let response = self.client
            .get(format!("{}/files", self.base_url))
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("fields", LIST_FIELDS),
                ("pageSize", PAGE_SIZE),
            ])
            .send()
            .await?;
        let listing: FileList = check_status(response).await?.json().await?;
        Ok(listing.files)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn find_or_create_folder(
        &self,
        token: &str,
        name: &str,
    ) -> Result<String, RemoteError> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query_value(name),
            FOLDER_MIME_TYPE,
        );
        let matches = self.query_files(token, &query).await?;
        if let Some(id) = pick_folder(matches) {
            return Ok(id);
        }

        let response = self.client
            .post(format!("{}/files", self.base_url))
            .bearer_auth(token)
            .query(&[("fields", FILE_FIELDS)])
            .json(&FileMetadata {
                name: name.to_owned(),
                parents: Vec::new(),
                mime_type: FOLDER_MIME_TYPE.to_owned(),
            })
            .send()
            .await?;
        let created: RemoteFile = check_status(response).await?.json().await?;
        Ok(created.id)
    }

    async fn list_files(
        &self,
        token: &str,
        folder_id: &str,
    ) -> Result<Vec<RemoteFile>, RemoteError> {
        let query = format!(
            "'{}' in parents and trashed = false",
            escape_query_value(folder_id),
        );
        self.query_files(token, &query).await
    }

    async fn create_file(
        &self,
        token: &str,
        metadata: &FileMetadata,
        body: &str,
    ) -> Result<RemoteFile, RemoteError> {
        let boundary = format!("part_{}", make_uuid(&mut rand::rng()).simple());
        let payload = multipart_related_body(&boundary, metadata, body)?;
        let response = self.client
            .post(format!("{}/files", self.upload_url))
            .bearer_auth(token)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(
                "Content-Type",
                format!("multipart/related; boundary={boundary}"),
            )
            .body(payload)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn update_file(
        &self,
        token: &str,
        id: &str,
        body: &str,
    ) -> Result<(), RemoteError> {
        let response = self.client
            .patch(format!("{}/files/{id}", self.upload_url))
            .bearer_auth(token)
            .query(&[("uploadType", "media")])
            .body(body.to_owned())
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    async fn delete_file(
        &self,
        token: &str,
        id: &str,
    ) -> Result<(), RemoteError> {
        let response = self.client
            .delete(format!("{}/files/{id}", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    async fn file_content(
        &self,
        token: &str,
        id: &str,
    ) -> Result<String, RemoteError> {
        let response = self.client
            .get(format!("{}/files/{id}", self.base_url))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        Ok(check_status(response).await?.text().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    match map_status(response.status()) {
        None => Ok(response),
        Some(err) => Err(err),
    }
}

fn map_status(status: StatusCode) -> Option<RemoteError> {
    match status {
        s if s.is_success() => None,
        StatusCode::UNAUTHORIZED => Some(RemoteError::Auth),
        // 403 and 404 both mean the entity is gone for this client
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND =>
            Some(RemoteError::NotFound),
        s => Some(RemoteError::Server(s.as_u16())),
    }
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Picks the surviving folder from a name query, or None when a folder
/// must be created. Concurrent clients can race the same create; every
/// client settles the duplicates on the lowest file id.
fn pick_folder(mut matches: Vec<RemoteFile>) -> Option<String> {
    if matches.len() > 1 {
        warn!(
            "found {} folders with the same name, picking the first by id",
            matches.len(),
        );
    }
    matches.sort_by(|a, b| a.id.cmp(&b.id));
    matches.into_iter().next().map(|folder| folder.id)
}

fn multipart_related_body(
    boundary: &str,
    metadata: &FileMetadata,
    body: &str,
) -> Result<String, RemoteError> {
    let metadata_json = serde_json::to_string(metadata)
        .map_err(|e| RemoteError::Protocol(e.to_string()))?;
    Ok(
        format!(
            "--{boundary}\r\n\
             Content-Type: application/json; charset=UTF-8\r\n\r\n\
             {metadata_json}\r\n\
             --{boundary}\r\n\
             Content-Type: {}\r\n\r\n\
             {body}\r\n\
             --{boundary}--",
            metadata.mime_type,
        )
    )
}
