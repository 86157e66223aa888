use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

use crate::config::Credentials;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::models::{Entry, Page, Project, User};
use crate::schema::{Validate, ValidationIssues, validate_page};

pub const USERS_PATH: &str = "/v3/users";
pub const PROJECTS_PATH: &str = "/v4/projects";
pub const ENTRIES_PATH: &str = "/v2/entries";

pub const CLIENT_IDENTIFICATION: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: BoxError,
    },
    #[error("{path} returned HTTP {status} {status_text}")]
    RemoteHttp {
        path: String,
        status: u16,
        status_text: String,
    },
    #[error("response from {path} has an unexpected shape, {issues}")]
    ResponseShape {
        path: String,
        issues: ValidationIssues,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Users,
    Entries,
    Projects,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Entries => "entries",
            Resource::Projects => "projects",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Failed to fetch {resource} from remote API: {source}")]
pub struct FetchError {
    pub resource: Resource,
    #[source]
    pub source: ClientError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues one GET against the remote API.
pub trait Transport: Send + Sync {
    fn get(&self, request: &Request) -> Result<RawResponse, BoxError>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(CLIENT_IDENTIFICATION)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, request: &Request) -> Result<RawResponse, BoxError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}{}", self.base_url, request.path),
            &request.query,
        )?;
        let mut builder = self.client.get(url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        let response = builder.send()?;
        let status = response.status();
        let body = response.text()?;
        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

pub struct ClockodoClient<T: Transport = HttpTransport> {
    transport: T,
    credentials: Credentials,
    sink: Arc<dyn DiagnosticSink>,
}

impl<T: Transport> ClockodoClient<T> {
    pub fn new(
        credentials: Credentials,
        transport: T,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ClientError> {
        if credentials.api_user.trim().is_empty() {
            return Err(ClientError::Configuration(
                "API user must not be empty".to_string(),
            ));
        }
        if credentials.api_key.trim().is_empty() {
            return Err(ClientError::Configuration(
                "API key must not be empty".to_string(),
            ));
        }
        Ok(Self {
            transport,
            credentials,
            sink,
        })
    }

    pub fn get_users(&self) -> Result<Vec<User>, FetchError> {
        self.paginate(Resource::Users, USERS_PATH, "data", &[])
            .map_err(|source| FetchError {
                resource: Resource::Users,
                source,
            })
    }

    pub fn get_projects(&self) -> Result<Vec<Project>, FetchError> {
        self.paginate(Resource::Projects, PROJECTS_PATH, "data", &[])
            .map_err(|source| FetchError {
                resource: Resource::Projects,
                source,
            })
    }

    /// Entries in the range for one user.
    ///
    /// The endpoint cannot filter by user, so every page of the range is
    /// fetched for all users and the result is narrowed afterwards.
    pub fn get_entries(
        &self,
        user_id: i64,
        time_since: &str,
        time_until: &str,
    ) -> Result<Vec<Entry>, FetchError> {
        let filters = [("time_since", time_since), ("time_until", time_until)];
        let entries: Vec<Entry> = self
            .paginate(Resource::Entries, ENTRIES_PATH, "entries", &filters)
            .map_err(|source| FetchError {
                resource: Resource::Entries,
                source,
            })?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.users_id == user_id)
            .collect())
    }

    fn paginate<V: Validate>(
        &self,
        resource: Resource,
        path: &str,
        items_field: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<V>, ClientError> {
        let mut items = Vec::new();
        let mut page_number = 1;
        loop {
            let mut query = vec![("page".to_string(), page_number.to_string())];
            query.extend(
                filters
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_string())),
            );

            let page: Page<V> =
                self.fetch(path, query, |raw| validate_page(raw, items_field))?;

            let is_last = page.is_last();
            if !is_last && page.paging.current_page < page_number {
                return Err(ClientError::ResponseShape {
                    path: path.to_string(),
                    issues: ValidationIssues::single(
                        "paging.current_page",
                        format!(
                            "requested page {page_number} but received page {}",
                            page.paging.current_page
                        ),
                    ),
                });
            }

            self.sink.record(&Diagnostic::PageAccepted {
                resource: resource.as_str(),
                page: page.paging.current_page,
                count_pages: page.paging.count_pages,
                items: page.items.len(),
            });

            page_number = page.paging.current_page + 1;
            items.extend(page.items);
            if is_last {
                return Ok(items);
            }
        }
    }

    fn fetch<R>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
        validate: impl FnOnce(&Value) -> Result<R, ValidationIssues>,
    ) -> Result<R, ClientError> {
        self.sink.record(&Diagnostic::Request {
            path: path.to_string(),
            query: query.clone(),
        });

        let request = Request {
            path: path.to_string(),
            query,
            headers: self.headers(),
        };
        let response = self
            .transport
            .get(&request)
            .map_err(|source| ClientError::Transport {
                path: path.to_string(),
                source,
            })?;

        self.sink.record(&Diagnostic::Response {
            path: path.to_string(),
            status: response.status,
        });

        if !response.is_success() {
            self.sink
                .record(&Diagnostic::error_body(path, response.status, &response.body));
            return Err(ClientError::RemoteHttp {
                path: path.to_string(),
                status: response.status,
                status_text: response.status_text,
            });
        }

        let raw: Value =
            serde_json::from_str(&response.body).map_err(|err| ClientError::ResponseShape {
                path: path.to_string(),
                issues: ValidationIssues::single("", format!("body is not valid JSON: {err}")),
            })?;

        validate(&raw).map_err(|issues| ClientError::ResponseShape {
            path: path.to_string(),
            issues,
        })
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Accept", "application/json".to_string()),
            ("X-ClockodoApiUser", self.credentials.api_user.clone()),
            ("X-ClockodoApiKey", self.credentials.api_key.clone()),
            (
                "X-Clockodo-External-Application",
                CLIENT_IDENTIFICATION.to_string(),
            ),
        ]
    }
}
