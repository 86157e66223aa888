use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use thiserror::Error;

use crate::clockodo::{ClockodoClient, FetchError, Transport};
use crate::dates::TimeRange;

pub const USERS_URI: &str = "clockodo://users";
pub const PROJECTS_URI: &str = "clockodo://projects";
pub const ENTRIES_URI_TEMPLATE: &str = "clockodo://entries/{user_id}/{time_since}/{time_until}";
pub const JSON_MIME: &str = "application/json";

const SCHEME: &str = "clockodo://";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid resource URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to serialize {uri}: {source}")]
    Serialize {
        uri: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub uri_template: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    Users,
    Projects,
    Entries { user_id: i64, range: TimeRange },
}

impl ResourceUri {
    pub fn parse(uri: &str) -> Result<Self, GatewayError> {
        let invalid = |reason: String| GatewayError::InvalidUri {
            uri: uri.to_string(),
            reason,
        };

        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| invalid(format!("expected the {SCHEME} scheme")))?;
        let segments = rest
            .trim_end_matches('/')
            .split('/')
            .map(|segment| percent_decode_str(segment).decode_utf8())
            .collect::<Result<Vec<Cow<'_, str>>, _>>()
            .map_err(|_| invalid("path is not valid UTF-8 after percent-decoding".to_string()))?;
        let segments: Vec<&str> = segments.iter().map(|segment| segment.as_ref()).collect();

        match segments.as_slice() {
            ["users"] => Ok(ResourceUri::Users),
            ["projects"] => Ok(ResourceUri::Projects),
            ["entries", user_id, since, until] => {
                let user_id = user_id
                    .parse::<i64>()
                    .map_err(|_| invalid(format!("user id {user_id:?} is not an integer")))?;
                let range = TimeRange::parse(since, until).map_err(invalid)?;
                Ok(ResourceUri::Entries { user_id, range })
            }
            ["entries", ..] => Err(invalid(format!("expected {ENTRIES_URI_TEMPLATE}"))),
            _ => Err(invalid("unknown resource".to_string())),
        }
    }
}

pub struct Gateway<T: Transport> {
    client: ClockodoClient<T>,
}

impl<T: Transport> Gateway<T> {
    pub fn new(client: ClockodoClient<T>) -> Self {
        Self { client }
    }

    pub fn list_resources(&self) -> Vec<ResourceInfo> {
        vec![
            ResourceInfo {
                uri: USERS_URI,
                name: "users",
                description: "All users of the Clockodo account",
                mime_type: JSON_MIME,
            },
            ResourceInfo {
                uri: PROJECTS_URI,
                name: "projects",
                description: "All projects of the Clockodo account",
                mime_type: JSON_MIME,
            },
        ]
    }

    pub fn list_templates(&self) -> Vec<ResourceTemplate> {
        vec![ResourceTemplate {
            uri_template: ENTRIES_URI_TEMPLATE,
            name: "entries",
            description: "Time entries of one user between two RFC 3339 timestamps",
            mime_type: JSON_MIME,
        }]
    }

    /// Fetches the resource behind `uri` as pretty-printed JSON.
    pub fn read(&self, uri: &str) -> Result<String, GatewayError> {
        let text = match ResourceUri::parse(uri)? {
            ResourceUri::Users => to_text(uri, &self.client.get_users()?),
            ResourceUri::Projects => to_text(uri, &self.client.get_projects()?),
            ResourceUri::Entries { user_id, range } => to_text(
                uri,
                &self
                    .client
                    .get_entries(user_id, range.since(), range.until())?,
            ),
        }?;
        log::info!("read {uri} ({} bytes)", text.len());
        Ok(text)
    }
}

fn to_text<S: Serialize>(uri: &str, value: &S) -> Result<String, GatewayError> {
    serde_json::to_string_pretty(value).map_err(|source| GatewayError::Serialize {
        uri: uri.to_string(),
        source,
    })
}
