use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use relay_core::{Tool, ToolSchema, ToolUnit};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

pub const NAME: &str = "conversation_summary_request";

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

pub fn schema() -> ToolSchema {
    ToolSchema::function(
        NAME,
        "Collects the user's name, email, phone number and a summary of the conversation, \
         then sends them to a webhook for follow-up.",
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "The user's full name." },
                "email": { "type": "string", "description": "A valid email address for the user." },
                "phone_number": {
                    "type": "string",
                    "description": "A valid phone number in international format."
                },
                "conversation_summary": {
                    "type": "string",
                    "description": "A short summary of the points discussed."
                }
            },
            "required": ["name", "email", "phone_number", "conversation_summary"]
        }),
    )
}

pub fn unit(webhook_url: &str) -> ToolUnit {
    ToolUnit::new()
        .with_schema(schema())
        .with_function(ConversationSummary::new(webhook_url))
}

// Values are kept loose: models often send the phone number as a JSON number.
#[derive(Debug, Default, Deserialize)]
struct SummaryArgs {
    name: Option<Value>,
    email: Option<Value>,
    phone_number: Option<Value>,
    conversation_summary: Option<Value>,
}

#[derive(Debug, Serialize)]
struct SummaryPayload {
    name: String,
    email: String,
    phone_number: String,
    conversation_summary: String,
}

// Text form of a provided value; null, false, 0 and "" count as missing.
fn present(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Null | Value::Bool(false) | Value::String(_) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

impl SummaryArgs {
    fn into_payload(self) -> Option<SummaryPayload> {
        Some(SummaryPayload {
            name: unescape(&present(self.name)?),
            email: unescape(&present(self.email)?),
            phone_number: present(self.phone_number)?,
            conversation_summary: unescape(&present(self.conversation_summary)?),
        })
    }
}

// Model output sometimes arrives percent-encoded.
fn unescape(text: &str) -> String {
    urlencoding::decode(text)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| text.to_string())
}

fn reply(status: &str, message: impl Into<String>) -> Value {
    json!({ "status": status, "message": message.into() })
}

/// Posts the collected contact details to a webhook.
///
/// Never fails: transport and HTTP errors come back as a
/// `{"status": "error"}` payload the assistant can relay to the user.
pub struct ConversationSummary {
    client: reqwest::Client,
    webhook_url: String,
}

impl ConversationSummary {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default webhook client: {}", e);
                reqwest::Client::new()
            });
        Self { client, webhook_url: webhook_url.into() }
    }
}

#[async_trait]
impl Tool for ConversationSummary {
    fn name(&self) -> &str {
        NAME
    }

    async fn call(&self, args: Value) -> Result<Value> {
        let args: SummaryArgs = serde_json::from_value(args).unwrap_or_else(|e| {
            warn!(tool = NAME, "Arguments are not an object, treating as empty: {}", e);
            SummaryArgs::default()
        });
        let Some(payload) = args.into_payload() else {
            return Ok(reply("error", "Missing required parameters to process the request."));
        };

        let response = match self.client.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                error!(url = %self.webhook_url, "Error sending data to webhook: {}", e);
                return Ok(reply("error", format!("Error connecting to the webhook: {e}")));
            }
        };

        let status = response.status();
        if status == StatusCode::OK {
            info!(email = %payload.email, "Conversation summary delivered");
            Ok(reply(
                "completed",
                "The conversation summary was sent successfully. We will contact you soon.",
            ))
        } else {
            let body = response.text().await.unwrap_or_default();
            error!(url = %self.webhook_url, %status, "Webhook rejected conversation summary");
            Ok(reply(
                "error",
                format!("Error connecting to the webhook: summary not accepted ({status}): {body}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, http::StatusCode as AxumStatus, routing::post, Json, Router};
    use tokio::net::TcpListener;

    use super::*;

    type Received = Arc<Mutex<Vec<Value>>>;

    async fn accept(State(received): State<Received>, Json(body): Json<Value>) -> AxumStatus {
        received.lock().unwrap().push(body);
        AxumStatus::OK
    }

    async fn reject() -> (AxumStatus, &'static str) {
        (AxumStatus::INTERNAL_SERVER_ERROR, "scenario paused")
    }

    async fn spawn_hook() -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/hook", post(accept))
            .route("/broken", post(reject))
            .with_state(received.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), received)
    }

    fn full_args() -> Value {
        json!({
            "name": "Ana%20Torres",
            "email": "ana%40example.com",
            "phone_number": "+51 999 111 222",
            "conversation_summary": "Wants%20a%20quote"
        })
    }

    #[tokio::test]
    async fn missing_parameters_return_error_without_posting() {
        let (base, received) = spawn_hook().await;
        let tool = ConversationSummary::new(format!("{base}/hook"));

        let out = tool.call(json!({ "name": "Ana", "email": "" })).await.unwrap();

        assert_eq!(out["status"], "error");
        assert!(out["message"].as_str().unwrap().contains("Missing required parameters"));
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn posts_decoded_payload_and_reports_success() {
        let (base, received) = spawn_hook().await;
        let tool = ConversationSummary::new(format!("{base}/hook"));

        let out = tool.call(full_args()).await.unwrap();

        assert_eq!(out["status"], "completed");
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["name"], "Ana Torres");
        assert_eq!(received[0]["email"], "ana@example.com");
        assert_eq!(received[0]["phone_number"], "+51 999 111 222");
        assert_eq!(received[0]["conversation_summary"], "Wants a quote");
    }

    #[tokio::test]
    async fn non_ok_status_becomes_error_reply() {
        let (base, _) = spawn_hook().await;
        let tool = ConversationSummary::new(format!("{base}/broken"));

        let out = tool.call(full_args()).await.unwrap();

        assert_eq!(out["status"], "error");
        assert!(out["message"].as_str().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn unreachable_webhook_becomes_error_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let tool = ConversationSummary::new(format!("http://{addr}/hook"));

        let out = tool.call(full_args()).await.unwrap();

        assert_eq!(out["status"], "error");
        assert!(out["message"].as_str().unwrap().starts_with("Error connecting to the webhook"));
    }

    #[tokio::test]
    async fn numeric_phone_number_is_accepted() {
        let (base, received) = spawn_hook().await;
        let tool = ConversationSummary::new(format!("{base}/hook"));

        let out = tool
            .call(json!({
                "name": "Ana",
                "email": "a@b.c",
                "phone_number": 51999111222u64,
                "conversation_summary": "quote"
            }))
            .await
            .unwrap();

        assert_eq!(out["status"], "completed");
        assert_eq!(received.lock().unwrap()[0]["phone_number"], "51999111222");
    }

    #[test]
    fn falsy_values_count_as_missing() {
        assert_eq!(present(Some(json!(null))), None);
        assert_eq!(present(Some(json!(""))), None);
        assert_eq!(present(Some(json!(false))), None);
        assert_eq!(present(Some(json!(0))), None);
        assert_eq!(present(None), None);
        assert_eq!(present(Some(json!(7))), Some("7".to_string()));
        assert_eq!(present(Some(json!("x"))), Some("x".to_string()));
    }

    #[test]
    fn unescape_keeps_invalid_sequences() {
        assert_eq!(unescape("a%2"), "a%2");
        assert_eq!(unescape("100%25"), "100%");
    }
}
