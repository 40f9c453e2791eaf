pub mod error;

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use mcd_jobs_core::{
    Workspace,
    config::DatabricksConfig,
    models::{
        Job, JobAccessControlRequest, JobId, JobSettings, NotificationDestination,
        ServicePrincipal,
    },
};
use reqwest::{
    RequestBuilder, Response,
    header::{self, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

pub use crate::error::ApiError;

const USER_AGENT: &str = concat!("mcd-jobs/", env!("CARGO_PKG_VERSION"));
const JOBS_PAGE_SIZE: u32 = 100;
const SCIM_PAGE_SIZE: u64 = 100;

/// Client for the workspace REST API, authenticated with a bearer token.
#[derive(Clone)]
pub struct Databricks {
    client: reqwest::Client,
    host: Url,
}

#[derive(Serialize)]
struct ListJobsParams<'a> {
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Deserialize)]
struct ListJobsResponse {
    #[serde(default)]
    jobs: Vec<Job>,
    #[serde(default)]
    has_more: bool,
    next_page_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScimListParams {
    start_index: u64,
    count: u64,
}

#[derive(Deserialize)]
struct ScimListResponse<T> {
    #[serde(rename = "Resources", default = "Vec::new")]
    resources: Vec<T>,
    #[serde(rename = "totalResults")]
    total_results: Option<u64>,
}

#[derive(Serialize)]
struct UpdateJobRequest<'a> {
    job_id: JobId,
    new_settings: &'a JobSettings,
}

#[derive(Serialize)]
struct UpdatePermissionsRequest<'a> {
    access_control_list: &'a [JobAccessControlRequest],
}

impl Databricks {
    pub fn new(config: &DatabricksConfig) -> Result<Self> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .context("Token contains invalid characters")?;
        authorization.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, authorization);
        let mut builder =
            reqwest::Client::builder().default_headers(headers).user_agent(USER_AGENT);
        if let Some(timeout) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let client = builder.build().context("Failed to create Databricks client")?;
        tracing::debug!("Using workspace {}", config.host);
        Ok(Self { client, host: config.host.clone() })
    }

    /// Append path segments to the host, keeping any path prefix it has.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.host.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid workspace host {}", self.host))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        Ok(send(request).await?.json().await?)
    }
}

/// Send the request, turning non-2xx responses into [`ApiError::Status`].
async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_body(status, &body))
}

impl Workspace for Databricks {
    async fn get_notification_destination(&self, id: &str) -> Result<NotificationDestination> {
        let url = self.endpoint(&["api", "2.0", "notification-destinations", id])?;
        Ok(self.json(self.client.get(url)).await?)
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let url = self.endpoint(&["api", "2.1", "jobs", "list"])?;
        let mut jobs = Vec::new();
        let mut page_token: Option<String> = None;
        let mut page = 1u32;
        loop {
            let params = ListJobsParams { limit: JOBS_PAGE_SIZE, page_token: page_token.as_deref() };
            let response: ListJobsResponse = self
                .json(self.client.get(url.clone()).query(&params))
                .await
                .with_context(|| format!("Failed to fetch jobs page {page}"))?;
            jobs.extend(response.jobs);
            let next = match response.next_page_token {
                Some(token) if response.has_more && !token.is_empty() => token,
                _ => break,
            };
            if page_token.as_deref() == Some(next.as_str()) {
                bail!("Infinite loop detected: next_page_token is the same as before");
            }
            page_token = Some(next);
            page += 1;
        }
        tracing::debug!("Fetched {} jobs in {} pages", jobs.len(), page);
        Ok(jobs)
    }

    async fn update_job(&self, job_id: JobId, new_settings: &JobSettings) -> Result<()> {
        let url = self.endpoint(&["api", "2.1", "jobs", "update"])?;
        send(self.client.post(url).json(&UpdateJobRequest { job_id, new_settings })).await?;
        Ok(())
    }

    async fn list_service_principals(&self) -> Result<Vec<ServicePrincipal>> {
        let url = self.endpoint(&["api", "2.0", "preview", "scim", "v2", "ServicePrincipals"])?;
        let mut principals = Vec::new();
        loop {
            // SCIM indices are 1-based
            let start_index = principals.len() as u64 + 1;
            let params = ScimListParams { start_index, count: SCIM_PAGE_SIZE };
            let response: ScimListResponse<ServicePrincipal> = self
                .json(self.client.get(url.clone()).query(&params))
                .await
                .with_context(|| {
                    format!("Failed to fetch service principals from index {start_index}")
                })?;
            if response.resources.is_empty() {
                break;
            }
            principals.extend(response.resources);
            match response.total_results {
                Some(total) if (principals.len() as u64) < total => {}
                _ => break,
            }
        }
        tracing::debug!("Fetched {} service principals", principals.len());
        Ok(principals)
    }

    async fn update_job_permissions(
        &self,
        job_id: JobId,
        access_control_list: &[JobAccessControlRequest],
    ) -> Result<()> {
        let job_id = job_id.to_string();
        let url = self.endpoint(&["api", "2.0", "permissions", "jobs", &job_id])?;
        send(self.client.patch(url).json(&UpdatePermissionsRequest { access_control_list }))
            .await?;
        Ok(())
    }
}
