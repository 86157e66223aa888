#[cfg(test)]
use std::sync::Mutex;

/// Longest slice of an error body kept for diagnostics.
pub const MAX_BODY_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Request {
        path: String,
        query: Vec<(String, String)>,
    },
    Response {
        path: String,
        status: u16,
    },
    PageAccepted {
        resource: &'static str,
        page: u64,
        count_pages: u64,
        items: usize,
    },
    ErrorBody {
        path: String,
        status: u16,
        body: String,
    },
}

impl Diagnostic {
    pub fn error_body(path: &str, status: u16, body: &str) -> Self {
        Diagnostic::ErrorBody {
            path: path.to_string(),
            status,
            body: body.chars().take(MAX_BODY_CHARS).collect(),
        }
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: &Diagnostic);
}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&self, event: &Diagnostic) {
        match event {
            Diagnostic::Request { path, query } => {
                let query = query
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect::<Vec<_>>()
                    .join("&");
                log::debug!("GET {path}?{query}");
            }
            Diagnostic::Response { path, status } => {
                log::debug!("{path} responded with {status}");
            }
            Diagnostic::PageAccepted {
                resource,
                page,
                count_pages,
                items,
            } => {
                log::debug!("{resource}: page {page}/{count_pages} with {items} items");
            }
            Diagnostic::ErrorBody { path, status, body } => {
                log::warn!("{path} failed with {status}: {body}");
            }
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Diagnostic>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl DiagnosticSink for RecordingSink {
    fn record(&self, event: &Diagnostic) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_is_truncated() {
        let body = "x".repeat(MAX_BODY_CHARS + 100);
        match Diagnostic::error_body("/v3/users", 500, &body) {
            Diagnostic::ErrorBody { body, status, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), MAX_BODY_CHARS);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::default();
        sink.record(&Diagnostic::Response {
            path: "/v3/users".to_string(),
            status: 200,
        });
        sink.record(&Diagnostic::Response {
            path: "/v4/projects".to_string(),
            status: 404,
        });
        let statuses: Vec<u16> = sink
            .events()
            .into_iter()
            .filter_map(|event| match event {
                Diagnostic::Response { status, .. } => Some(status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![200, 404]);
    }
}
