//! REST client for the UI-permission endpoints.

use crate::config::{ClientConfig, ClientCredentials};
use crate::error::RestError;
use async_trait::async_trait;
use fieldgate_core::{
    ApiResult, BulkCheckRequest, BulkCheckResult, BulkUpdateRequest, CopyPermissionsRequest,
    PermissionApi, PermissionDependencies, PermissionNode, PermissionSnapshot,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use tracing::debug;

const MY_PERMISSIONS_PATH: &str = "/users/ui-permissions/my-permissions/";
const CHECK_BULK_PATH: &str = "/users/ui-permissions/check-bulk/";
const TREE_PATH: &str = "/users/ui-permissions/tree/";
const BULK_UPDATE_PATH: &str = "/users/group-ui-permissions/bulk-update/";
const COPY_PERMISSIONS_PATH: &str = "/users/group-ui-permissions/copy-permissions/";

/// Error body shapes the backend is known to send.
#[derive(Debug, Deserialize)]
struct ServerErrorBody {
    detail: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

impl ServerErrorBody {
    fn into_message(self) -> Option<String> {
        self.detail.or(self.error).or(self.message)
    }
}

#[derive(Clone)]
pub struct RestPermissionApi {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
}

impl RestPermissionApi {
    pub fn new(config: &ClientConfig) -> Result<Self, RestError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let auth_header = build_auth_headers(&config.auth)?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T, Q>(&self, path: &str, query: Option<&Q>) -> Result<T, RestError>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");
        let mut request = self.client.get(url).headers(self.auth_header.clone());
        if let Some(query) = query {
            request = request.query(query);
        }
        let response = request.send().await?;
        self.parse_response(response).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, RestError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let response = self.post(path, body).await?;
        self.parse_response(response).await
    }

    /// POST where the response body carries nothing the caller needs.
    async fn post_discard<B>(&self, path: &str, body: &B) -> Result<(), RestError>
    where
        B: serde::Serialize + ?Sized,
    {
        let response = self.post(path, body).await?;
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(status, text))
        }
    }

    async fn post<B>(&self, path: &str, body: &B) -> Result<reqwest::Response, RestError>
    where
        B: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "POST");
        let response = self
            .client
            .post(url)
            .headers(self.auth_header.clone())
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, RestError> {
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(serde_json::from_str::<T>(&text)?)
        } else {
            Err(status_error(status, text))
        }
    }
}

#[async_trait]
impl PermissionApi for RestPermissionApi {
    async fn my_permissions(&self) -> ApiResult<PermissionSnapshot> {
        Ok(self.get_json::<_, ()>(MY_PERMISSIONS_PATH, None).await?)
    }

    async fn check_bulk(&self, request: &BulkCheckRequest) -> ApiResult<BulkCheckResult> {
        Ok(self.post_json(CHECK_BULK_PATH, request).await?)
    }

    async fn permission_tree(&self, group_id: Option<i64>) -> ApiResult<Vec<PermissionNode>> {
        let tree: Vec<PermissionNode> = match group_id {
            Some(group_id) => {
                self.get_json(TREE_PATH, Some(&[("group_id", group_id)]))
                    .await?
            }
            None => self.get_json::<_, ()>(TREE_PATH, None).await?,
        };
        Ok(tree)
    }

    async fn permission_dependencies(&self, codename: &str) -> ApiResult<PermissionDependencies> {
        let path = format!(
            "/users/ui-permissions/{}/dependencies/",
            urlencoding::encode(codename)
        );
        Ok(self.get_json::<_, ()>(&path, None).await?)
    }

    async fn bulk_update_group_permissions(&self, request: &BulkUpdateRequest) -> ApiResult<()> {
        debug!(
            group_id = request.group_id,
            changes = request.permissions.len(),
            "Submitting bulk permission update"
        );
        Ok(self.post_discard(BULK_UPDATE_PATH, request).await?)
    }

    async fn copy_permissions(&self, request: &CopyPermissionsRequest) -> ApiResult<()> {
        Ok(self.post_discard(COPY_PERMISSIONS_PATH, request).await?)
    }
}

fn status_error(status: reqwest::StatusCode, text: String) -> RestError {
    let message = serde_json::from_str::<ServerErrorBody>(&text)
        .ok()
        .and_then(ServerErrorBody::into_message)
        .unwrap_or(text);
    RestError::Status {
        status: status.as_u16(),
        message,
    }
}

fn build_auth_headers(auth: &ClientCredentials) -> Result<HeaderMap, RestError> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &auth.api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key).map_err(|e| RestError::Config(e.to_string()))?,
        );
    }
    if let Some(jwt) = &auth.jwt {
        let value = format!("Bearer {}", jwt);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&value).map_err(|e| RestError::Config(e.to_string()))?,
        );
    }
    Ok(headers)
}
