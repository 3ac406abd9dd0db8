//! Live-reload channel, its Server-Sent Events endpoint, and the client script
//! injected into served HTML pages.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;

/// SSE stream of reload events.
pub const EVENTS_PATH: &str = "/__sitepipe/livereload";
/// Browser side of the channel.
pub const CLIENT_PATH: &str = "/__sitepipe/client.js";

const CHANNEL_CAPACITY: usize = 16;

const CLIENT_JS: &str = r#"(function () {
  var source = new EventSource("/__sitepipe/livereload");
  source.addEventListener("reload", function () {
    location.reload();
  });
  source.addEventListener("css", function (e) {
    var path = JSON.parse(e.data).path;
    var swapped = false;
    document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {
      var url = new URL(link.href, location.href);
      if (url.pathname === path) {
        url.searchParams.set("livereload", Date.now());
        link.href = url.href;
        swapped = true;
      }
    });
    if (!swapped) location.reload();
  });
})();
"#;

/// A change pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// Reload the whole page
    Reload,
    /// Re-fetch one stylesheet without a page reload
    Css { path: String },
}

impl ReloadEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ReloadEvent::Reload => "reload",
            ReloadEvent::Css { .. } => "css",
        }
    }

    /// SSE payload (JSON).
    pub fn data(&self) -> String {
        match self {
            ReloadEvent::Reload => json!({ "type": "reload" }).to_string(),
            ReloadEvent::Css { path } => json!({ "type": "css", "path": path }).to_string(),
        }
    }

    fn to_sse(&self) -> Event {
        Event::default().event(self.name()).data(self.data())
    }
}

/// Handle to the live-reload broadcast channel.
///
/// Created once per dev session and shared by the server (which subscribes a
/// receiver per connected browser) and the build (which sends).
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<ReloadEvent>,
}

impl LiveReload {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Broadcast an event. Returns how many clients received it.
    pub fn send(&self, event: ReloadEvent) -> usize {
        tracing::debug!(event = event.name(), "live reload");
        // An error only means nobody is connected
        self.tx.send(event).unwrap_or(0)
    }

    /// Ask every client to reload the page.
    pub fn reload(&self) -> usize {
        self.send(ReloadEvent::Reload)
    }

    /// Ask every client to re-fetch the stylesheet served at `path`.
    pub fn css(&self, path: impl Into<String>) -> usize {
        self.send(ReloadEvent::Css { path: path.into() })
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

/// `GET /__sitepipe/livereload`
pub async fn events(
    State(reload): State<LiveReload>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = reload.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            match rx.recv().await {
                Ok(event) => yield Ok(event.to_sse()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Missed events cannot be replayed; a full reload catches up
                    tracing::warn!(skipped, "live-reload client lagged");
                    yield Ok(ReloadEvent::Reload.to_sse());
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}

/// `GET /__sitepipe/client.js`
pub async fn client_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_JS,
    )
}

/// Middleware adding the client script tag to full `text/html` responses.
pub async fn inject_client(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if response.status() != StatusCode::OK || !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read HTML response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(inject_script(&bytes)))
}

/// Insert the client `<script>` before the last `</body>`, or append it when
/// the page has none.
pub fn inject_script(html: &[u8]) -> Vec<u8> {
    let tag = format!(r#"<script src="{}"></script>"#, CLIENT_PATH);
    let close = b"</body>";
    let at = html
        .windows(close.len())
        .rposition(|w| w.eq_ignore_ascii_case(close))
        .unwrap_or(html.len());

    let mut out = Vec::with_capacity(html.len() + tag.len());
    out.extend_from_slice(&html[..at]);
    out.extend_from_slice(tag.as_bytes());
    out.extend_from_slice(&html[at..]);
    out
}
