use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{CatalogClient, ProjectRecord, VersionRecord, VersionRef};
use crate::core::error::{PackError, PackResult};

pub const DEFAULT_CATALOG_URL: &str = "https://api.modrinth.com/v2";

#[derive(Serialize)]
struct HashLookupRequest<'a> {
    hashes: &'a [String],
    algorithm: &'a str,
}

/// HTTP client for the Modrinth v2 API.
#[derive(Debug, Clone)]
pub struct ModrinthClient {
    client: Client,
    base_url: String,
}

impl ModrinthClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> PackResult<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            };
            return Err(PackError::Remote {
                status_code: status.as_u16(),
                message,
            });
        }
        Ok(resp.json::<T>().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PackResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let resp = self.client.get(&url).send().await?;
        Self::decode(resp).await
    }
}

#[async_trait]
impl CatalogClient for ModrinthClient {
    async fn lookup_by_hashes(
        &self,
        hashes: &[String],
        algorithm: &str,
    ) -> PackResult<HashMap<String, VersionRef>> {
        if hashes.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/version_files", self.base_url);
        debug!("POST {} ({} hashes)", url, hashes.len());
        let resp = self
            .client
            .post(&url)
            .json(&HashLookupRequest { hashes, algorithm })
            .send()
            .await
            .map_err(|e| PackError::Lookup {
                source: Box::new(e.into()),
            })?;

        Self::decode(resp).await.map_err(|e| PackError::Lookup {
            source: Box::new(e),
        })
    }

    async fn get_project(&self, id: &str) -> PackResult<ProjectRecord> {
        self.get_json(&format!("/project/{id}")).await
    }

    async fn get_projects(&self, ids: &[String]) -> PackResult<Vec<ProjectRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/projects", self.base_url);
        let encoded = serde_json::to_string(ids)?;
        debug!("GET {} ({} ids)", url, ids.len());
        let resp = self
            .client
            .get(&url)
            .query(&[("ids", encoded)])
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn get_version(&self, id: &str) -> PackResult<VersionRecord> {
        self.get_json(&format!("/version/{id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http::build_http_client;
    use crate::core::side::SideSupport;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ModrinthClient {
        ModrinthClient::new(build_http_client().unwrap(), format!("{}/", server.uri()))
    }

    #[tokio::test]
    async fn lookup_posts_one_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/version_files"))
            .and(body_json(serde_json::json!({
                "hashes": ["h1", "h2"],
                "algorithm": "sha512"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "h1": {"id": "verA", "project_id": "projP", "files": [], "loaders": ["fabric"]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let found = client
            .lookup_by_hashes(&["h1".to_string(), "h2".to_string()], "sha512")
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(
            found["h1"],
            VersionRef {
                version_id: "verA".into(),
                project_id: "projP".into()
            }
        );
    }

    #[tokio::test]
    async fn lookup_failure_is_a_lookup_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/version_files"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .lookup_by_hashes(&["h1".to_string()], "sha512")
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::Lookup { .. }));
    }

    #[tokio::test]
    async fn get_projects_sends_json_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .and(query_param("ids", r#"["a","b"]"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "a", "title": "Alpha", "slug": "alpha", "project_type": "mod",
                 "client_side": "required", "server_side": "optional"},
                {"id": "b", "title": "Beta", "project_type": "resourcepack"}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let projects = client
            .get_projects(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].server_side, SideSupport::Optional);
        assert_eq!(projects[1].slug, None);
        assert_eq!(projects[1].client_side, SideSupport::Unknown);
    }

    #[tokio::test]
    async fn rate_limit_status_surfaces_as_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/project/abc"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.get_project("abc").await.unwrap_err();
        assert!(matches!(err, PackError::Remote { status_code: 429, .. }));
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn get_version_reads_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version/verA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "verA",
                "project_id": "projP",
                "loaders": ["fabric"],
                "files": [{
                    "filename": "sodium.jar",
                    "url": "https://cdn.example/sodium.jar",
                    "hashes": {"sha1": "aa", "sha512": "bb"},
                    "primary": true,
                    "size": 10
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let version = client.get_version("verA").await.unwrap();
        assert_eq!(version.files[0].hashes["sha1"], "aa");
        assert!(version.files[0].primary);
    }
}
