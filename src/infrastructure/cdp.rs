//! Chrome DevTools Protocol page driver.
//!
//! Attaches to a tab of an already running Chromium (started with
//! `--remote-debugging-port`) and implements [`Page`] by evaluating the
//! registry script from [`super::page_script`] in it.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::page_script::{self, Call};
use crate::application::{Page, ScrollAlign};
use crate::domain::dom::{Document, ElementHandle, Node};
use crate::domain::{detect_site, AppError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A debuggable target as listed by `/json/list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    pub url: String,
    pub web_socket_debugger_url: Option<String>,
}

impl TargetInfo {
    fn is_page(&self) -> bool {
        self.kind == "page" && self.web_socket_debugger_url.is_some()
    }
}

/// Lists the browser's debuggable targets.
///
/// # Errors
/// Returns error if the DevTools endpoint cannot be reached or answers
/// with something other than a target list.
pub async fn list_targets(cdp_url: &str) -> Result<Vec<TargetInfo>> {
    let url = format!("{}/json/list", cdp_url.trim_end_matches('/'));
    tracing::debug!(%url, "Listing DevTools targets");

    let response = reqwest::get(&url)
        .await
        .map_err(|e| AppError::cdp(format!("Failed to reach {url}"), e))?
        .error_for_status()
        .map_err(|e| AppError::cdp(format!("DevTools endpoint {url} returned an error"), e))?;

    response
        .json()
        .await
        .map_err(|e| AppError::cdp("Failed to parse the DevTools target list", e))
}

/// Picks the tab to export.
///
/// With a filter, the first page whose URL or title contains it wins.
/// Without one, the first page showing a supported chat site is used.
///
/// # Errors
/// Returns error if no page matches.
pub fn select_target(targets: &[TargetInfo], filter: Option<&str>) -> Result<TargetInfo> {
    let mut pages = targets.iter().filter(|t| t.is_page());
    let found = match filter {
        Some(filter) => pages.find(|t| t.url.contains(filter) || t.title.contains(filter)),
        None => pages.find(|t| detect_site(&t.url).is_ok()),
    };
    found.cloned().ok_or_else(|| {
        AppError::page(match filter {
            Some(filter) => format!("No browser tab matches '{filter}'"),
            None => "No browser tab shows a supported chat site".to_string(),
        })
    })
}

/// One DevTools websocket session.
///
/// Commands are sent one at a time; events arriving while a command is in
/// flight are skipped.
pub struct CdpConnection {
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
    stream: Mutex<SplitStream<WsStream>>,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<CommandError>,
}

#[derive(Debug, Deserialize)]
struct CommandError {
    code: i64,
    message: String,
}

impl CdpConnection {
    /// Opens the websocket at `ws_url`.
    ///
    /// # Errors
    /// Returns error if the websocket handshake fails.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (ws, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| AppError::cdp(format!("Failed to connect to {ws_url}"), e))?;
        let (sink, stream) = ws.split();
        tracing::debug!(%ws_url, "DevTools session opened");

        Ok(Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            next_id: AtomicU64::new(1),
        })
    }

    /// Sends a command and waits for its result.
    ///
    /// # Errors
    /// Returns error if the socket fails or the browser rejects the command.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let mut stream = self.stream.lock().await;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({ "id": id, "method": method, "params": params }).to_string();

        self.sink
            .lock()
            .await
            .send(WsMessage::Text(payload))
            .await
            .map_err(|e| AppError::cdp(format!("Failed to send {method}"), e))?;

        while let Some(frame) = stream.next().await {
            let frame = frame.map_err(|e| AppError::cdp(format!("Failed to read {method} reply"), e))?;
            let WsMessage::Text(text) = frame else {
                continue;
            };
            let response: CommandResponse = serde_json::from_str(&text).map_err(AppError::json_parse)?;
            if response.id != Some(id) {
                continue;
            }
            if let Some(error) = response.error {
                return Err(AppError::Cdp {
                    message: format!("{method} failed ({}): {}", error.code, error.message),
                    source: None,
                });
            }
            return Ok(response.result.unwrap_or(Value::Null));
        }

        Err(AppError::Cdp {
            message: format!("DevTools session closed while waiting for {method}"),
            source: None,
        })
    }
}

/// A browser tab driven over DevTools.
pub struct CdpPage {
    connection: CdpConnection,
}

impl CdpPage {
    /// Connects to `target` and brings it to the front.
    ///
    /// The tab needs focus for the page's own copy buttons to reach the
    /// clipboard.
    ///
    /// # Errors
    /// Returns error if the target has no websocket or cannot be attached.
    pub async fn attach(target: &TargetInfo) -> Result<Self> {
        let ws_url = target.web_socket_debugger_url.as_deref().ok_or_else(|| AppError::Cdp {
            message: format!("Tab {} is already being debugged", target.id),
            source: None,
        })?;
        let connection = CdpConnection::connect(ws_url).await?;
        connection.send("Page.bringToFront", json!({})).await?;
        tracing::info!(url = %target.url, title = %target.title, "Attached to tab");
        Ok(Self { connection })
    }

    async fn call<T: DeserializeOwned>(&self, call: Call, args: &[Value]) -> Result<T> {
        let result = self
            .connection
            .send(
                "Runtime.evaluate",
                json!({
                    "expression": page_script::expression(call, args),
                    "returnByValue": true,
                    "userGesture": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let message = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script error");
            return Err(AppError::page(message.to_string()));
        }

        let encoded = result
            .pointer("/result/value")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::page(format!("{call:?} returned no value")))?;
        serde_json::from_str(encoded).map_err(AppError::json_parse)
    }
}

#[async_trait]
impl Page for CdpPage {
    async fn url(&self) -> Result<String> {
        self.call(Call::Url, &[]).await
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        self.call(Call::QueryAll, &[json!(selector)]).await
    }

    async fn document(&self) -> Result<Document> {
        let root: Node = self.call(Call::Document, &[]).await?;
        Ok(Document::from_node(&root))
    }

    async fn snapshot(&self, element: ElementHandle) -> Result<Document> {
        let root: Node = self.call(Call::Snapshot, &[json!(element)]).await?;
        Ok(Document::from_node(&root))
    }

    async fn closest(&self, element: ElementHandle, selector: &str) -> Result<Option<ElementHandle>> {
        self.call(Call::Closest, &[json!(element), json!(selector)]).await
    }

    async fn click(&self, element: ElementHandle) -> Result<()> {
        self.call::<bool>(Call::Click, &[json!(element)]).await?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: ElementHandle, align: ScrollAlign) -> Result<()> {
        self.call::<bool>(Call::ScrollIntoView, &[json!(element), json!(align.as_str())])
            .await?;
        Ok(())
    }

    async fn scroll_top(&self, element: ElementHandle) -> Result<f64> {
        self.call(Call::ScrollTop, &[json!(element)]).await
    }

    async fn set_scroll_top(&self, element: ElementHandle, top: f64) -> Result<()> {
        self.call::<bool>(Call::SetScrollTop, &[json!(element), json!(top)]).await?;
        Ok(())
    }

    async fn press_key(&self, element: ElementHandle, key: &str) -> Result<()> {
        self.call::<bool>(Call::PressKey, &[json!(element), json!(key)]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str, kind: &str, url: &str, title: &str) -> TargetInfo {
        TargetInfo {
            id: id.into(),
            kind: kind.into(),
            title: title.into(),
            url: url.into(),
            web_socket_debugger_url: Some(format!("ws://127.0.0.1:9222/devtools/page/{id}")),
        }
    }

    #[test]
    fn test_target_list_parses() {
        let raw = r#"[{
            "description": "",
            "devtoolsFrontendUrl": "/devtools/inspector.html?ws=127.0.0.1:9222/devtools/page/A1",
            "id": "A1",
            "title": "Claude",
            "type": "page",
            "url": "https://claude.ai/chat/abc",
            "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/A1"
        }, {
            "id": "W1",
            "type": "service_worker",
            "url": "https://chatgpt.com/sw.js"
        }]"#;
        let targets: Vec<TargetInfo> = serde_json::from_str(raw).unwrap();

        assert_eq!(targets.len(), 2);
        assert!(targets[0].is_page());
        assert!(!targets[1].is_page());
    }

    #[test]
    fn test_select_first_supported_page() {
        let targets = vec![
            target("1", "page", "https://example.com", "Example"),
            target("2", "service_worker", "https://chatgpt.com/sw.js", ""),
            target("3", "page", "https://aistudio.google.com/prompts/x", "AI Studio"),
            target("4", "page", "https://claude.ai/chat/y", "Claude"),
        ];

        assert_eq!(select_target(&targets, None).unwrap().id, "3");
        assert_eq!(select_target(&targets, Some("Claude")).unwrap().id, "4");
        assert_eq!(select_target(&targets, Some("example.com")).unwrap().id, "1");
        assert!(matches!(
            select_target(&targets, Some("nothing")),
            Err(AppError::Page { .. })
        ));
    }

    #[test]
    fn test_no_supported_page() {
        let targets = vec![target("1", "page", "https://example.com", "Example")];
        assert!(select_target(&targets, None).is_err());
    }

    #[test]
    fn test_command_error_reply_parses() {
        let reply: CommandResponse = serde_json::from_str(
            r#"{"id": 4, "error": {"code": -32000, "message": "Cannot find context"}}"#,
        )
        .unwrap();
        assert_eq!(reply.id, Some(4));
        assert_eq!(reply.error.unwrap().code, -32000);
    }
}
