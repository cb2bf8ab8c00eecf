//! HTTP gateway for larkbridge.
//!
//! One public surface, mirroring how the platform calls a webhook bot:
//! - `GET /` — configuration self-check report, for operators.
//! - `POST /` — the platform webhook: endpoint verification challenges,
//!   message events, and a self-check fallback for probes without an
//!   event header.
//!
//! Webhook responses are acknowledgments, not answers: the platform only
//! needs a small JSON envelope with a `code`, while the actual reply to
//! the user travels through the messenger API out of band.
//!
//! Built on Axum.

use axum::{
    Router,
    extract::State,
    response::Json,
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};

use larkbridge_core::event::{ChatKind, InboundEvent, Mention, MessageEvent};
use larkbridge_engine::{MessageHandler, Outcome};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: larkbridge_config::AppConfig,
    pub handler: MessageHandler,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with the gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(self_check_handler).post(webhook_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(state: SharedState) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Wire types ---
//
// The platform's event v2 envelope. Everything is optional at the top
// level because the same endpoint receives verification challenges,
// encrypted payloads we reject, and bare operator probes.

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(default)]
    encrypt: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    challenge: Option<String>,
    #[serde(default)]
    header: Option<WireHeader>,
    #[serde(default)]
    event: Option<WireEvent>,
}

#[derive(Debug, Deserialize)]
struct WireHeader {
    event_id: String,
    event_type: String,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    sender: WireSender,
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireSender {
    sender_id: WireSenderId,
}

#[derive(Debug, Deserialize)]
struct WireSenderId {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    message_id: String,
    chat_id: String,
    /// `"p2p"` or `"group"` on the wire.
    chat_type: String,
    message_type: String,
    content: String,
    #[serde(default)]
    mentions: Option<Vec<WireMention>>,
}

#[derive(Debug, Deserialize)]
struct WireMention {
    name: String,
}

impl WebhookEnvelope {
    fn to_inbound_event(&self) -> Option<InboundEvent> {
        let header = self.header.as_ref()?;
        let message = self.event.as_ref().map(|e| MessageEvent {
            message_id: e.message.message_id.clone(),
            chat_id: e.message.chat_id.clone(),
            sender_id: e.sender.sender_id.user_id.clone(),
            chat_type: if e.message.chat_type == "p2p" {
                ChatKind::Direct
            } else {
                ChatKind::Group
            },
            message_type: e.message.message_type.clone(),
            content: e.message.content.clone(),
            mentions: e
                .message
                .mentions
                .iter()
                .flatten()
                .map(|m| Mention {
                    name: m.name.clone(),
                })
                .collect(),
        });

        Some(InboundEvent {
            event_id: header.event_id.clone(),
            event_type: header.event_type.clone(),
            message,
        })
    }
}

// --- Handlers ---

async fn self_check_handler(State(state): State<SharedState>) -> Json<Value> {
    let report = state.config.self_check();
    Json(serde_json::to_value(report).unwrap_or_else(|_| json!({ "code": 1 })))
}

async fn webhook_handler(
    State(state): State<SharedState>,
    Json(envelope): Json<WebhookEnvelope>,
) -> Json<Value> {
    // Encrypted payloads are not supported; tell the operator to turn the
    // feature off rather than silently dropping events.
    if envelope.encrypt.is_some() {
        warn!("Received encrypted payload, encrypt key must be disabled");
        return Json(json!({
            "code": 1,
            "message": {
                "zh_CN": "你配置了 Encrypt Key，请关闭该功能。",
                "en_US": "You have open Encrypt Key Feature, please close it.",
            },
        }));
    }

    // Endpoint verification: echo the challenge back.
    if envelope.kind.as_deref() == Some("url_verification") {
        info!("Answering url_verification challenge");
        return Json(json!({ "challenge": envelope.challenge }));
    }

    // A POST without an event header is an operator probing the endpoint;
    // answer with the same report as `GET /`.
    if envelope.header.is_none() {
        let report = state.config.self_check();
        return Json(serde_json::to_value(report).unwrap_or_else(|_| json!({ "code": 1 })));
    }

    let Some(event) = envelope.to_inbound_event() else {
        return Json(json!({ "code": 2 }));
    };

    if event.event_type == "im.message.receive_v1" {
        return match state.handler.handle(&event).await {
            Ok(Outcome::Duplicate) => Json(json!({ "code": 1 })),
            Ok(_) => Json(json!({ "code": 0 })),
            Err(e) => {
                error!(event_id = %event.event_id, error = %e, "Event processing failed");
                Json(json!({ "code": 1 }))
            }
        };
    }

    Json(json!({ "code": 2 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use larkbridge_config::{AppConfig, FeishuConfig, OpenAiConfig};
    use larkbridge_core::completion::{CompletionEngine, CompletionRequest};
    use larkbridge_core::error::{CompletionError, MessengerError};
    use larkbridge_core::messenger::Messenger;
    use larkbridge_core::store::TurnStore;
    use larkbridge_core::turn::SessionId;
    use larkbridge_engine::{ContextBuilder, EvictionPolicy, FirstCharClassifier};
    use larkbridge_store::InMemoryStore;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct CannedCompletion;

    #[async_trait]
    impl CompletionEngine for CannedCompletion {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _: CompletionRequest) -> Result<String, CompletionError> {
            Ok("canned answer".into())
        }
    }

    #[derive(Default)]
    struct RecordingMessenger {
        replies: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn reply(&self, message_id: &str, text: &str) -> Result<(), MessengerError> {
            self.replies
                .lock()
                .unwrap()
                .push((message_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            feishu: FeishuConfig {
                app_id: "cli_test".into(),
                app_secret: "secret".into(),
                bot_name: "chatbot".into(),
            },
            openai: OpenAiConfig {
                api_key: "sk-test".into(),
                ..OpenAiConfig::default()
            },
            server: Default::default(),
        }
    }

    fn test_app() -> (Router, Arc<InMemoryStore>, Arc<RecordingMessenger>) {
        let store = Arc::new(InMemoryStore::new());
        let messenger = Arc::new(RecordingMessenger::default());
        let handler = MessageHandler::new(
            store.clone(),
            store.clone(),
            Arc::new(CannedCompletion),
            messenger.clone(),
            ContextBuilder::new(store.clone(), Arc::new(FirstCharClassifier)),
            EvictionPolicy::new(1024),
            "chatbot",
            1024,
        );
        let state = Arc::new(GatewayState {
            config: test_config(),
            handler,
        });
        (build_router(state), store, messenger)
    }

    fn post_json(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn message_event(event_id: &str, text: &str) -> Value {
        json!({
            "schema": "2.0",
            "header": {
                "event_id": event_id,
                "event_type": "im.message.receive_v1",
            },
            "event": {
                "sender": { "sender_id": { "user_id": "u1" } },
                "message": {
                    "message_id": format!("om_{event_id}"),
                    "chat_id": "c1",
                    "chat_type": "p2p",
                    "message_type": "text",
                    "content": json!({ "text": text }).to_string(),
                },
            },
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn get_root_serves_self_check() {
        let (app, _, _) = test_app();

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["code"], 0);
        assert_eq!(body["meta"]["bot_name"], "chatbot");
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge() {
        let (app, _, _) = test_app();

        let response = app
            .oneshot(post_json(json!({
                "type": "url_verification",
                "challenge": "c-123",
                "token": "t",
            })))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["challenge"], "c-123");
    }

    #[tokio::test]
    async fn encrypted_payload_is_rejected() {
        let (app, _, messenger) = test_app();

        let response = app
            .oneshot(post_json(json!({ "encrypt": "AAAA" })))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["code"], 1);
        assert!(body["message"]["en_US"]
            .as_str()
            .unwrap()
            .contains("Encrypt Key"));
        assert!(messenger.replies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn post_without_header_serves_self_check() {
        let (app, _, _) = test_app();

        let response = app.oneshot(post_json(json!({}))).await.unwrap();

        let body = body_json(response).await;
        assert_eq!(body["code"], 0);
        assert!(body["message"]["zh_cn"].as_str().is_some());
    }

    #[tokio::test]
    async fn message_event_is_processed_and_acknowledged() {
        let (app, store, messenger) = test_app();

        let response = app
            .oneshot(post_json(message_event("e1", "Hello")))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["code"], 0);

        let replies = messenger.replies.lock().unwrap().clone();
        assert_eq!(replies, vec![("om_e1".to_string(), "canned answer".to_string())]);

        let turns = store
            .list_by_session(&SessionId("c1u1".into()))
            .await
            .unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].question, "Hello");
    }

    #[tokio::test]
    async fn redelivered_event_acknowledged_with_code_one() {
        let (app, _, messenger) = test_app();

        let first = app
            .clone()
            .oneshot(post_json(message_event("e1", "Hello")))
            .await
            .unwrap();
        assert_eq!(body_json(first).await["code"], 0);

        let second = app
            .oneshot(post_json(message_event("e1", "Hello")))
            .await
            .unwrap();
        assert_eq!(body_json(second).await["code"], 1);

        assert_eq!(messenger.replies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_event_type_falls_through() {
        let (app, _, _) = test_app();

        let response = app
            .oneshot(post_json(json!({
                "header": {
                    "event_id": "e1",
                    "event_type": "im.chat.updated_v1",
                },
            })))
            .await
            .unwrap();

        assert_eq!(body_json(response).await["code"], 2);
    }

    #[tokio::test]
    async fn group_message_without_mention_still_acknowledged() {
        let (app, _, messenger) = test_app();

        let mut event = message_event("e1", "hello all");
        event["event"]["message"]["chat_type"] = json!("group");

        let response = app.oneshot(post_json(event)).await.unwrap();

        // Everyday group chatter: acknowledged but not replied to.
        assert_eq!(body_json(response).await["code"], 0);
        assert!(messenger.replies.lock().unwrap().is_empty());
    }
}
