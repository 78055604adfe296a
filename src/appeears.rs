use crate::error::{AuthError, RemoteError};
use crate::remote::{AppeearsOps, BundleFile, FileBody, RemoteStatus, Token};
use crate::submit::TaskRequest;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://appeears.earthdatacloud.nasa.gov/api/";

/// HTTP client for the AppEEARS API.
pub struct Appeears {
    client: Client,
    base: Url,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    files: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct BundleResponse {
    #[serde(default)]
    files: Vec<BundleFile>,
}

impl Appeears {
    pub fn new(base: Url) -> Self {
        Self {
            client: Client::new(),
            base,
        }
    }

    /// Exchanges Earthdata credentials for a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        let response = self
            .client
            .post(self.endpoint("login")?)
            .basic_auth(username, Some(password))
            .send()
            .await
            .map_err(RemoteError::from)?;
        let login: LoginResponse = decode(response).await?;
        Ok(Token::new(login.token))
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.base.join(path)?)
    }

    async fn get(&self, path: &str, token: &Token) -> Result<Response, RemoteError> {
        let response = self
            .client
            .get(self.endpoint(path)?)
            .bearer_auth(token.as_str())
            .send()
            .await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let bytes = check_status(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// The status endpoint redirects to the bundle listing once a task is done, so
/// a body with `files` and no `status` reads as done. A body with neither gives
/// an empty status, which the poller does not recognize.
fn remote_status(report: StatusResponse) -> RemoteStatus {
    let status = match (report.status, report.files) {
        (Some(status), _) => status,
        (None, Some(_)) => "done".to_string(),
        (None, None) => String::new(),
    };
    RemoteStatus {
        status,
        message: report.message,
    }
}

impl AppeearsOps for Appeears {
    async fn submit_task(
        &self,
        request: &TaskRequest,
        token: &Token,
    ) -> Result<String, RemoteError> {
        let response = self
            .client
            .post(self.endpoint("task")?)
            .bearer_auth(token.as_str())
            .json(request)
            .send()
            .await?;
        let submitted: SubmitResponse = decode(response).await?;
        Ok(submitted.task_id)
    }

    async fn task_status(&self, task_id: &str, token: &Token) -> Result<RemoteStatus, RemoteError> {
        let response = self.get(&format!("status/{task_id}"), token).await?;
        let report: StatusResponse = decode(response).await?;
        Ok(remote_status(report))
    }

    async fn list_bundle(
        &self,
        task_id: &str,
        token: &Token,
    ) -> Result<Vec<BundleFile>, RemoteError> {
        let response = self.get(&format!("bundle/{task_id}"), token).await?;
        let bundle: BundleResponse = decode(response).await?;
        Ok(bundle.files)
    }

    async fn fetch_file(
        &self,
        task_id: &str,
        file_id: &str,
        token: &Token,
    ) -> Result<FileBody, RemoteError> {
        let response = self
            .get(&format!("bundle/{task_id}/{file_id}"), token)
            .await?;
        let content_length = response.content_length();
        let chunks = response
            .bytes_stream()
            .map_ok(|bytes| bytes.to_vec())
            .map_err(RemoteError::from)
            .boxed();
        Ok(FileBody {
            content_length,
            chunks,
        })
    }
}
