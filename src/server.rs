use std::io::{self, BufRead, Write};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::clockodo::Transport;
use crate::gateway::{Gateway, GatewayError, JSON_MIME};

pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    /// `None` only when the key is absent; `"id": null` is still a request.
    #[serde(default, deserialize_with = "present_id")]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

fn present_id<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<GatewayError> for RpcError {
    fn from(err: GatewayError) -> Self {
        let code = match err {
            GatewayError::InvalidUri { .. } => INVALID_PARAMS,
            GatewayError::Fetch(_) | GatewayError::Serialize { .. } => INTERNAL_ERROR,
        };
        RpcError::new(code, err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

impl RpcResponse {
    fn reply(id: Value, outcome: Result<Value, RpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(result) => (Some(result), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            jsonrpc: "2.0",
            id,
            result,
            error,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReadParams {
    uri: String,
}

pub struct Server<T: Transport> {
    gateway: Gateway<T>,
}

impl<T: Transport> Server<T> {
    pub fn new(gateway: Gateway<T>) -> Self {
        Self { gateway }
    }

    /// Answers one request per input line until EOF.
    pub fn serve<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> io::Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line) {
                let encoded = serde_json::to_string(&response)
                    .map_err(io::Error::other)?;
                writeln!(writer, "{encoded}")?;
                writer.flush()?;
            }
        }
        log::info!("input closed, shutting down");
        Ok(())
    }

    fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                log::warn!("unparseable request: {err}");
                return Some(RpcResponse::reply(
                    Value::Null,
                    Err(RpcError::new(PARSE_ERROR, format!("Parse error: {err}"))),
                ));
            }
        };

        let Some(id) = request.id else {
            log::debug!("notification {}", request.method);
            return None;
        };

        log::debug!("request {} ({id})", request.method);
        let outcome = self.dispatch(&request.method, request.params);
        if let Err(err) = &outcome {
            log::warn!("{} failed: {}", request.method, err.message);
        }
        Some(RpcResponse::reply(id, outcome))
    }

    fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(initialize(&params)),
            "ping" => Ok(json!({})),
            "resources/list" => Ok(json!({ "resources": self.gateway.list_resources() })),
            "resources/templates/list" => {
                Ok(json!({ "resourceTemplates": self.gateway.list_templates() }))
            }
            "resources/read" => {
                let params: ReadParams = serde_json::from_value(params)
                    .map_err(|err| RpcError::new(INVALID_PARAMS, format!("Invalid params: {err}")))?;
                let text = self.gateway.read(&params.uri)?;
                Ok(json!({
                    "contents": [{
                        "uri": params.uri,
                        "mimeType": JSON_MIME,
                        "text": text,
                    }]
                }))
            }
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }
}

fn initialize(params: &Value) -> Value {
    let version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);
    json!({
        "protocolVersion": version,
        "capabilities": { "resources": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clockodo::ClockodoClient;
    use crate::clockodo::tests::{ScriptedTransport, page, user};
    use crate::config::Credentials;
    use crate::diagnostics::RecordingSink;
    use std::io::Cursor;
    use std::sync::Arc;

    fn run(transport: ScriptedTransport, input: &str) -> Vec<Value> {
        let client = ClockodoClient::new(
            Credentials::new("ada@example.com", "super-secret-key"),
            transport,
            Arc::new(RecordingSink::default()),
        )
        .unwrap();
        let server = Server::new(Gateway::new(client));
        let mut output = Vec::new();
        server.serve(Cursor::new(input.to_string()), &mut output).unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn initialize_echoes_requested_version() {
        let responses = run(
            ScriptedTransport::new(),
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#,
        );
        assert_eq!(responses.len(), 1);
        let result = &responses[0]["result"];
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["resources"].is_object());
    }

    #[test]
    fn notifications_and_blank_lines_get_no_reply() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#,
            "\n"
        );
        let responses = run(ScriptedTransport::new(), input);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], "a");
        assert_eq!(responses[0]["result"], json!({}));
    }

    #[test]
    fn null_id_is_answered_not_dropped() {
        let responses = run(
            ScriptedTransport::new(),
            r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#,
        );
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["result"], json!({}));
    }

    #[test]
    fn lists_resources_and_templates() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"resources/templates/list"}"#
        );
        let responses = run(ScriptedTransport::new(), input);
        let resources = responses[0]["result"]["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0]["uri"], "clockodo://users");
        assert_eq!(resources[0]["mimeType"], JSON_MIME);
        let templates = responses[1]["result"]["resourceTemplates"].as_array().unwrap();
        assert_eq!(
            templates[0]["uriTemplate"],
            "clockodo://entries/{user_id}/{time_since}/{time_until}"
        );
    }

    #[test]
    fn reads_resource_contents() {
        let transport = ScriptedTransport::new().ok(page("data", 1, 1, 1, vec![user(1, "Ada")]));
        let responses = run(
            transport,
            r#"{"jsonrpc":"2.0","id":7,"method":"resources/read","params":{"uri":"clockodo://users"}}"#,
        );
        let contents = &responses[0]["result"]["contents"][0];
        assert_eq!(contents["uri"], "clockodo://users");
        assert_eq!(contents["mimeType"], JSON_MIME);
        let users: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
        assert_eq!(users[0], user(1, "Ada"));
    }

    #[test]
    fn maps_failures_to_error_codes() {
        let transport = ScriptedTransport::new().status(500, "Internal Server Error", "");
        let input = [
            "not json",
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"resources/read","params":{}}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"resources/read","params":{"uri":"clockodo://nope"}}"#,
            r#"{"jsonrpc":"2.0","id":4,"method":"resources/read","params":{"uri":"clockodo://projects"}}"#,
        ]
        .join("\n");
        let responses = run(transport, &input);
        let codes: Vec<i64> = responses
            .iter()
            .map(|response| response["error"]["code"].as_i64().unwrap())
            .collect();
        assert_eq!(
            codes,
            vec![PARSE_ERROR, METHOD_NOT_FOUND, INVALID_PARAMS, INVALID_PARAMS, INTERNAL_ERROR]
        );
        assert_eq!(responses[0]["id"], Value::Null);
        let message = responses[4]["error"]["message"].as_str().unwrap();
        assert!(message.starts_with("Failed to fetch projects from remote API"));
        assert!(!message.contains("super-secret-key"));
    }
}
