//! Google Drive v3 backend.
//!
//! Doodles live in a single folder. Ids handed to the gallery are Drive file
//! ids; callers may also address a doodle by its file name, which is resolved
//! with a folder-scoped lookup before the real call.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{BlobStore, StoreError};
use crate::credentials::{AuthError, CredentialProvider};
use crate::models::doodle::{self, Doodle, EXTENSION, MIME_TYPE};

const PAGE_SIZE: &str = "1000";

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

pub struct DriveStore {
    http: Client,
    credentials: Arc<dyn CredentialProvider>,
    api_base: String,
    folder_id: String,
    share_publicly: bool,
}

impl DriveStore {
    pub fn new(
        http: Client,
        credentials: Arc<dyn CredentialProvider>,
        api_base: String,
        folder_id: String,
        share_publicly: bool,
    ) -> Self {
        Self {
            http,
            credentials,
            api_base: api_base.trim_end_matches('/').to_string(),
            folder_id,
            share_publicly,
        }
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/drive/v3/files/{}", self.api_base, urlencoding::encode(id))
    }

    fn image_url(&self, id: &str) -> String {
        if self.share_publicly {
            format!("https://drive.google.com/uc?export=view&id={}", urlencoding::encode(id))
        } else {
            format!("/image/{}", urlencoding::encode(id))
        }
    }

    fn entry(&self, file: DriveFile) -> Doodle {
        Doodle {
            url: self.image_url(&file.id),
            id: file.id,
            name: file.name,
        }
    }

    async fn authed(&self, builder: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        let token = self.credentials.access_token().await?;
        let builder = builder.bearer_auth(token);
        Ok(match self.credentials.api_key() {
            Some(key) => builder.query(&[("key", key)]),
            None => builder,
        })
    }

    /// Sends with a bearer token. A 401 triggers one refresh and one retry
    /// when the credentials hold a refresh token.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        let retry = builder.try_clone();
        let response = self.authed(builder).await?.send().await?;
        let Some(retry) = retry else {
            return Ok(response);
        };
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        match self.credentials.refresh().await {
            Ok(()) => log::warn!("drive rejected the access token; retrying with a refreshed one"),
            Err(AuthError::NotConfigured | AuthError::MissingToken) => return Ok(response),
            Err(e) => return Err(e.into()),
        }
        Ok(self.authed(retry).await?.send().await?)
    }

    async fn check(response: Response, id: &str) -> Result<Response, StoreError> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Remote { status, message });
        }
        Ok(response)
    }

    async fn query_files(&self, q: &str, page_token: Option<&str>) -> Result<FileList, StoreError> {
        let mut params = vec![
            ("q", q),
            ("fields", "nextPageToken,files(id,name)"),
            ("pageSize", PAGE_SIZE),
            ("orderBy", "name desc"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let response = self.send(self.http.get(self.files_url()).query(&params)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            // the folder itself is gone; that is a backend failure, not a missing doodle
            return Err(StoreError::Remote {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("folder {} is not reachable", self.folder_id),
            });
        }
        let response = Self::check(response, &self.folder_id).await?;
        Ok(response.json().await?)
    }

    /// Exact-name lookup inside the configured folder.
    async fn find_by_name(&self, name: &str) -> Result<DriveFile, StoreError> {
        let q = format!(
            "name='{}' and '{}' in parents and trashed=false",
            escape_query(name),
            escape_query(&self.folder_id)
        );
        let list = self.query_files(&q, None).await?;
        list.files
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn resolve_id(&self, id: &str) -> Result<String, StoreError> {
        if id.ends_with(EXTENSION) {
            Ok(self.find_by_name(id).await?.id)
        } else {
            Ok(id.to_string())
        }
    }

    async fn share(&self, id: &str) -> Result<(), StoreError> {
        let body = serde_json::json!({ "role": "reader", "type": "anyone" });
        let response = self
            .send(self.http.post(format!("{}/permissions", self.file_url(id))).json(&body))
            .await?;
        Self::check(response, id).await?;
        Ok(())
    }
}

/// Drive query string literals use backslash escapes.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Builds a `multipart/related` body: JSON metadata part, then the media part.
fn related_body(boundary: &str, metadata: &serde_json::Value, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {MIME_TYPE}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[async_trait]
impl BlobStore for DriveStore {
    async fn put(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<Doodle, StoreError> {
        let metadata = serde_json::json!({
            "name": suggested_name,
            "parents": [self.folder_id],
            "mimeType": MIME_TYPE,
        });
        let boundary = format!("doodle-{}", uuid::Uuid::new_v4().simple());
        let request = self
            .http
            .post(format!("{}/upload/drive/v3/files", self.api_base))
            .query(&[("uploadType", "multipart"), ("fields", "id,name")])
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(related_body(&boundary, &metadata, &bytes));
        let response = Self::check(self.send(request).await?, suggested_name).await?;
        let file: DriveFile = response.json().await?;
        log::info!("uploaded {} to drive as {}", file.name, file.id);

        if self.share_publicly {
            self.share(&file.id).await?;
        }
        Ok(self.entry(file))
    }

    async fn list(&self) -> Result<Vec<Doodle>, StoreError> {
        let q = format!(
            "'{}' in parents and mimeType='{MIME_TYPE}' and trashed=false",
            escape_query(&self.folder_id)
        );
        let mut doodles = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.query_files(&q, page_token.as_deref()).await?;
            doodles.extend(page.files.into_iter().map(|f| self.entry(f)));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        doodle::sort_newest_first(&mut doodles);
        Ok(doodles)
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let file_id = self.resolve_id(id).await?;
        let response = self
            .send(self.http.get(self.file_url(&file_id)).query(&[("alt", "media")]))
            .await?;
        let response = Self::check(response, id).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let file_id = self.resolve_id(id).await?;
        let response = self.send(self.http.delete(self.file_url(&file_id))).await?;
        Self::check(response, id).await?;
        log::info!("deleted drive file {file_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GoogleConfig;
    use crate::credentials::GoogleCredentials;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer, share_publicly: bool) -> DriveStore {
        let cfg = GoogleConfig {
            access_token: Some("tok".into()),
            ..GoogleConfig::default()
        };
        let creds = GoogleCredentials::from_config(&cfg, Client::new());
        DriveStore::new(
            Client::new(),
            Arc::new(creds),
            server.uri(),
            "folder-9".into(),
            share_publicly,
        )
    }

    #[actix_web::test]
    async fn put_uploads_into_folder_and_shares() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .and(query_param("uploadType", "multipart"))
            .and(header("authorization", "Bearer tok"))
            .and(body_string_contains("\"parents\":[\"folder-9\"]"))
            .and(body_string_contains("doodle-42.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "id": "f-1", "name": "doodle-42.png" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/drive/v3/files/f-1/permissions"))
            .and(body_string_contains("anyone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "p" })))
            .expect(1)
            .mount(&server)
            .await;

        let d = store(&server, true).put(vec![0, 1], "doodle-42.png").await.unwrap();
        assert_eq!(d.id, "f-1");
        assert_eq!(d.url, "https://drive.google.com/uc?export=view&id=f-1");
    }

    #[actix_web::test]
    async fn quota_error_is_upload_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .respond_with(ResponseTemplate::new(403).set_body_string("storageQuotaExceeded"))
            .mount(&server)
            .await;

        let err = store(&server, false).put(vec![0], "doodle-1.png").await.unwrap_err();
        match err {
            StoreError::Remote { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "storageQuotaExceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[actix_web::test]
    async fn list_follows_pages_and_sorts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{ "id": "b", "name": "doodle-300.png" }]
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("q", "'folder-9' in parents and mimeType='image/png' and trashed=false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [
                    { "id": "a", "name": "doodle-100.png" },
                    { "id": "c", "name": "doodle-200.png" }
                ],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let list = store(&server, false).list().await.unwrap();
        let names: Vec<_> = list.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["doodle-300.png", "doodle-200.png", "doodle-100.png"]);
        assert_eq!(list[0].url, "/image/b");
    }

    #[actix_web::test]
    async fn delete_by_name_resolves_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param(
                "q",
                "name='doodle-5.png' and 'folder-9' in parents and trashed=false",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{ "id": "id-5", "name": "doodle-5.png" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/drive/v3/files/id-5"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        store(&server, false).delete("doodle-5.png").await.unwrap();
    }

    #[actix_web::test]
    async fn delete_unknown_name_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "files": [] })))
            .mount(&server)
            .await;

        let err = store(&server, false).delete("doodle-5.png").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[actix_web::test]
    async fn delete_unknown_id_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/drive/v3/files/nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store(&server, false).delete("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[actix_web::test]
    async fn fetch_downloads_media() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/f-1"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8, 8, 9]))
            .mount(&server)
            .await;

        assert_eq!(store(&server, false).fetch("f-1").await.unwrap(), vec![7, 8, 9]);
    }

    #[actix_web::test]
    async fn rejected_token_is_refreshed_and_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_credentials"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{ "id": "a", "name": "doodle-1.png" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("refresh_token=rt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = GoogleConfig {
            client_id: Some("client-1".into()),
            client_secret: Some("s3cret".into()),
            access_token: Some("stale".into()),
            refresh_token: Some("rt".into()),
            token_url: format!("{}/token", server.uri()),
            ..GoogleConfig::default()
        };
        let creds = GoogleCredentials::from_config(&cfg, Client::new());
        let store = DriveStore::new(Client::new(), Arc::new(creds), server.uri(), "folder-9".into(), false);

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "doodle-1.png");
    }

    #[actix_web::test]
    async fn rejected_token_without_refresh_is_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_credentials"))
            .expect(1)
            .mount(&server)
            .await;

        let err = store(&server, false).list().await.unwrap_err();
        assert!(matches!(err, StoreError::Remote { status: 401, .. }));
    }

    #[actix_web::test]
    async fn missing_folder_fails_listing_instead_of_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store(&server, false).list().await.unwrap_err();
        assert!(matches!(err, StoreError::Remote { status: 404, .. }));
    }

    #[test]
    fn query_literals_are_escaped() {
        assert_eq!(escape_query("it's"), "it\\'s");
        assert_eq!(escape_query("a\\b"), "a\\\\b");
    }
}
