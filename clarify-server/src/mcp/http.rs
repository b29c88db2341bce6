//! MCP streamable-HTTP transport bridge.
//!
//! `POST /mcp` carries JSON-RPC requests, `GET /mcp` opens the session's
//! event stream, `DELETE /mcp` tears the session down. Transport sessions
//! are addressed by the `Mcp-Session-Id` header assigned during initialize.
//! The wire details follow the adopted protocol; the tool semantics are the
//! same four operations the stdio server exposes.

use crate::error::AppError;
use crate::handlers::AppState;
use crate::mcp::ops;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Live transport sessions and their (optional) event-stream senders.
#[derive(Default)]
pub struct McpSessionManager {
    sessions: RwLock<HashMap<String, Option<mpsc::Sender<web::Bytes>>>>,
}

impl McpSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn create(&self) -> Option<String> {
        let token = Uuid::new_v4().to_string();
        self.sessions.write().ok()?.insert(token.clone(), None);
        Some(token)
    }

    fn contains(&self, token: &str) -> bool {
        self.sessions
            .read()
            .map(|sessions| sessions.contains_key(token))
            .unwrap_or(false)
    }

    fn attach_stream(&self, token: &str) -> Option<mpsc::Receiver<web::Bytes>> {
        let (tx, rx) = mpsc::channel(16);
        let mut sessions = self.sessions.write().ok()?;
        let slot = sessions.get_mut(token)?;
        // a comment frame tells the client the stream is live
        let _ = tx.try_send(web::Bytes::from_static(b": connected\n\n"));
        *slot = Some(tx);
        Some(rx)
    }

    fn remove(&self, token: &str) -> bool {
        self.sessions
            .write()
            .ok()
            .map(|mut sessions| sessions.remove(token).is_some())
            .unwrap_or(false)
    }
}

fn session_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

fn rpc_result(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn rpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

/// Tool descriptors for `tools/list`. Kept in sync with the stdio tool set.
fn tool_descriptors() -> Value {
    json!([
        {
            "name": "generate_questions",
            "description": "Generate 5-7 clarifying questions for a task description and open a session; pass sessionId to fetch an existing session's questions instead",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "taskDescription": {"type": "string", "description": "Informal description of the task to clarify"},
                    "sessionId": {"type": "string", "description": "Existing session to return instead of generating anew"}
                },
                "required": ["taskDescription"]
            }
        },
        {
            "name": "answer_question",
            "description": "Record the user's answer to one question in a session",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "sessionId": {"type": "string"},
                    "questionId": {"type": "string"},
                    "answer": {"type": "string"}
                },
                "required": ["sessionId", "questionId", "answer"]
            }
        },
        {
            "name": "get_context",
            "description": "Get the full task context for a session: description, questions, answers, and progress",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "sessionId": {"type": "string"}
                },
                "required": ["sessionId"]
            }
        },
        {
            "name": "list_sessions",
            "description": "List every live session with its question and answer counts",
            "inputSchema": {"type": "object", "properties": {}}
        }
    ])
}

fn required_str<'a>(arguments: &'a Value, field: &str) -> Result<&'a str, AppError> {
    arguments
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::InvalidRequest(format!("{field} is required")))
}

async fn call_tool(data: &AppState, name: &str, arguments: &Value) -> Result<Value, AppError> {
    match name {
        "generate_questions" => {
            let task_description = required_str(arguments, "taskDescription")?;
            let session_id = arguments.get("sessionId").and_then(Value::as_str);
            ops::generate_questions(&data.store, &data.generator, task_description, session_id)
                .await
        }
        "answer_question" => {
            ops::answer_question(
                &data.store,
                required_str(arguments, "sessionId")?,
                required_str(arguments, "questionId")?,
                required_str(arguments, "answer")?,
            )
            .await
        }
        "get_context" => ops::get_context(&data.store, required_str(arguments, "sessionId")?),
        "list_sessions" => ops::list_sessions(&data.store),
        other => Err(AppError::InvalidRequest(format!("unknown tool: {other}"))),
    }
}

/// `POST /mcp` - dispatch one JSON-RPC message.
pub async fn post_message(
    req: HttpRequest,
    data: web::Data<AppState>,
    manager: web::Data<McpSessionManager>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    let message = body.into_inner();
    let method = message
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let id = message.get("id").cloned().unwrap_or(Value::Null);

    if method == "initialize" {
        let token = manager
            .create()
            .ok_or_else(|| AppError::Internal("MCP session registry poisoned".to_string()))?;
        tracing::info!(session = %token, "MCP HTTP session initialized");
        let result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {
                "name": "clarify-server",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        return Ok(HttpResponse::Ok()
            .insert_header((SESSION_HEADER, token))
            .json(rpc_result(id, result)));
    }

    // Every other message must reference a known transport session
    let known = session_token(&req)
        .map(|token| manager.contains(&token))
        .unwrap_or(false);
    if !known {
        return Ok(HttpResponse::NotFound()
            .json(rpc_error(id, -32001, "Unknown or missing Mcp-Session-Id")));
    }

    if method.starts_with("notifications/") {
        return Ok(HttpResponse::Accepted().finish());
    }

    let response = match method.as_str() {
        "ping" => rpc_result(id, json!({})),
        "tools/list" => rpc_result(id, json!({"tools": tool_descriptors()})),
        "tools/call" => {
            let params = message.get("params").cloned().unwrap_or_else(|| json!({}));
            let name = params
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

            match call_tool(&data, name, &arguments).await {
                Ok(value) => {
                    let text = serde_json::to_string_pretty(&value)?;
                    rpc_result(
                        id,
                        json!({"content": [{"type": "text", "text": text}], "isError": false}),
                    )
                }
                Err(
                    e @ (AppError::NotFound(_)
                    | AppError::SessionNotFound(_)
                    | AppError::InvalidRequest(_)),
                ) => rpc_result(
                    id,
                    json!({"content": [{"type": "text", "text": e.to_string()}], "isError": true}),
                ),
                Err(e) => rpc_error(id, -32603, &e.to_string()),
            }
        }
        _ => rpc_error(id, -32601, &format!("Method not found: {method}")),
    };

    Ok(HttpResponse::Ok().json(response))
}

/// `GET /mcp` - open the session-addressed event stream.
pub async fn open_stream(
    req: HttpRequest,
    manager: web::Data<McpSessionManager>,
) -> Result<HttpResponse, AppError> {
    let Some(token) = session_token(&req) else {
        return Ok(HttpResponse::NotFound().finish());
    };
    let Some(rx) = manager.attach_stream(&token) else {
        return Ok(HttpResponse::NotFound().finish());
    };

    let stream = ReceiverStream::new(rx).map(Ok::<_, actix_web::Error>);
    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream))
}

/// `DELETE /mcp` - terminate the transport session.
pub async fn terminate(
    req: HttpRequest,
    manager: web::Data<McpSessionManager>,
) -> Result<HttpResponse, AppError> {
    let removed = session_token(&req)
        .map(|token| {
            let removed = manager.remove(&token);
            if removed {
                tracing::info!(session = %token, "MCP HTTP session terminated");
            }
            removed
        })
        .unwrap_or(false);

    if removed {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Ok(HttpResponse::NotFound().finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::ApiKeyAuth;
    use crate::routes::configure_routes;
    use crate::test_support::{state_with, MockLlmClient};
    use actix_web::{http::StatusCode, test, App};

    const ENVELOPE: &str = r#"{"questions": [
        {"id": "q1", "text": "Which platforms?", "category": "scope", "options": ["Web"]},
        {"id": "q2", "text": "Which stack?", "category": "tech_stack", "options": ["React"]}
    ]}"#;

    #[::core::prelude::v1::test]
    fn descriptors_cover_the_four_tools() {
        let descriptors = tool_descriptors();
        let names: Vec<&str> = descriptors
            .as_array()
            .unwrap()
            .iter()
            .map(|tool| tool["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "generate_questions",
                "answer_question",
                "get_context",
                "list_sessions"
            ]
        );
    }

    #[::core::prelude::v1::test]
    fn manager_tracks_session_lifecycle() {
        let manager = McpSessionManager::new();
        let token = manager.create().unwrap();
        assert!(manager.contains(&token));
        assert!(manager.attach_stream(&token).is_some());
        assert!(manager.attach_stream("unknown").is_none());
        assert!(manager.remove(&token));
        assert!(!manager.contains(&token));
        assert!(!manager.remove(&token));
    }

    macro_rules! bridge_app {
        ($ctx:expr) => {
            test::init_service(
                App::new()
                    .app_data($ctx.state.clone())
                    .app_data(web::Data::new(McpSessionManager::new()))
                    .wrap(ApiKeyAuth)
                    .configure(configure_routes),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn initialize_assigns_a_session_token() {
        let ctx = state_with(MockLlmClient::replying(ENVELOPE), None);
        let app = bridge_app!(ctx);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/mcp")
                .set_json(serde_json::json!({
                    "jsonrpc": "2.0", "id": 1, "method": "initialize",
                    "params": {"protocolVersion": "2025-03-26", "capabilities": {}}
                }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("Mcp-Session-Id").is_some());

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(body["result"]["serverInfo"]["name"], "clarify-server");
    }

    #[actix_rt::test]
    async fn requests_without_a_session_are_rejected() {
        let ctx = state_with(MockLlmClient::replying(ENVELOPE), None);
        let app = bridge_app!(ctx);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/mcp")
                .set_json(serde_json::json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn tools_flow_over_the_bridge() {
        let ctx = state_with(MockLlmClient::replying(ENVELOPE), None);
        let app = bridge_app!(ctx);

        let init = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/mcp")
                .set_json(serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
                .to_request(),
        )
        .await;
        let token = init
            .headers()
            .get("Mcp-Session-Id")
            .and_then(|h| h.to_str().ok())
            .unwrap()
            .to_string();

        let listed: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/mcp")
                .insert_header(("Mcp-Session-Id", token.clone()))
                .set_json(serde_json::json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
                .to_request(),
        )
        .await;
        assert_eq!(listed["result"]["tools"].as_array().unwrap().len(), 4);

        let called: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/mcp")
                .insert_header(("Mcp-Session-Id", token.clone()))
                .set_json(serde_json::json!({
                    "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                    "params": {"name": "generate_questions", "arguments": {"taskDescription": "build a chat app"}}
                }))
                .to_request(),
        )
        .await;
        assert_eq!(called["result"]["isError"], false);
        let text = called["result"]["content"][0]["text"].as_str().unwrap();
        let payload: Value = serde_json::from_str(text).unwrap();
        assert_eq!(payload["questions"].as_array().unwrap().len(), 2);

        // unknown ids surface as a tool error, not a transport error
        let bad: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/mcp")
                .insert_header(("Mcp-Session-Id", token.clone()))
                .set_json(serde_json::json!({
                    "jsonrpc": "2.0", "id": 4, "method": "tools/call",
                    "params": {"name": "answer_question", "arguments": {"sessionId": "sess_missing", "questionId": "q1", "answer": "x"}}
                }))
                .to_request(),
        )
        .await;
        assert_eq!(bad["result"]["isError"], true);

        // teardown
        let deleted = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri("/mcp")
                .insert_header(("Mcp-Session-Id", token))
                .to_request(),
        )
        .await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    }
}
