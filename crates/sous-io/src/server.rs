//! HTTP front end over a shared [`Cooker`].
//!
//! | method | path       | body                                  |
//! |--------|------------|---------------------------------------|
//! | GET    | `/`        | cooker page (`/style.css`, `/cooker.js`) |
//! | GET    | `/state`   | state as JSON                         |
//! | POST   | `/state`   | form or JSON update, returns new state |
//! | GET    | `/history` | recorded states as a JSON array       |
//! | GET    | `/health`  | `OK`                                  |

use crate::protocol::{self, StateUpdate};
use sous_core::{ControlError, Cooker, PinProvider};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};

/// Largest request body accepted.
const MAX_BODY: u64 = 16 * 1024;

const COOKER_HTML: &str = include_str!("../site/cooker.html");
const STYLE_CSS: &str = include_str!("../site/style.css");
const COOKER_JS: &str = include_str!("../site/cooker.js");

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9901".to_string(),
            poll_interval: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("failed to spawn server thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A response, independent of the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    fn text(status: u16, body: impl Into<String>) -> Self {
        Self::asset(status, "text/plain; charset=utf-8", body)
    }

    fn asset(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }
}

/// Answer one request against `cooker`.
pub fn route<P: PinProvider>(
    cooker: &Cooker<P>,
    method: &Method,
    url: &str,
    content_type: Option<&str>,
    body: &str,
) -> Reply {
    let path = url.split('?').next().unwrap_or(url);
    match (method, path) {
        (Method::Get, "/" | "/index.html") => {
            Reply::asset(200, "text/html; charset=utf-8", COOKER_HTML)
        }
        (Method::Get, "/style.css") => Reply::asset(200, "text/css; charset=utf-8", STYLE_CSS),
        (Method::Get, "/cooker.js") => {
            Reply::asset(200, "application/javascript; charset=utf-8", COOKER_JS)
        }
        (Method::Get, "/state") => Reply::json(200, protocol::encode_state(&cooker.get_state())),
        (Method::Post, "/state") => post_state(cooker, content_type, body),
        (Method::Get, "/history") => Reply::json(200, protocol::encode_history(&cooker.history())),
        (Method::Get, "/health") => Reply::text(200, "OK"),
        (
            _,
            "/" | "/index.html" | "/style.css" | "/cooker.js" | "/state" | "/history" | "/health",
        ) => Reply::text(405, "Method Not Allowed"),
        _ => Reply::text(404, "Not Found"),
    }
}

fn post_state<P: PinProvider>(cooker: &Cooker<P>, content_type: Option<&str>, body: &str) -> Reply {
    let update = match StateUpdate::parse(content_type, body) {
        Ok(update) => update,
        Err(err) => {
            debug!(error = %err, "rejected state update");
            return Reply::json(400, protocol::encode_error(err, protocol::tunable_keys()));
        }
    };

    match cooker.modify_state(|state| update.apply(state)) {
        Ok(state) => {
            info!(fields = update.fields.len(), setting = state.setting, "state updated");
            Reply::json(200, protocol::encode_state(&state))
        }
        Err(
            err @ (ControlError::UnknownStateField { .. } | ControlError::InvalidStateValue { .. }),
        ) => {
            debug!(error = %err, "rejected state update");
            Reply::json(400, protocol::encode_error(err, protocol::tunable_keys()))
        }
        Err(err) => {
            warn!(error = %err, "state update failed");
            Reply::json(500, protocol::encode_error(err, Vec::new()))
        }
    }
}

/// Bind `config.bind_addr` and serve `cooker` on a background thread until `stop`
/// is set. Binding happens before this returns.
pub fn run_server<P: PinProvider>(
    cooker: Arc<Cooker<P>>,
    config: ServerConfig,
    stop: Arc<AtomicBool>,
) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
    let server = Server::http(&config.bind_addr).map_err(|e| ServerError::Bind {
        addr: config.bind_addr.clone(),
        reason: e.to_string(),
    })?;
    let local = server.server_addr().to_ip().ok_or_else(|| ServerError::Bind {
        addr: config.bind_addr.clone(),
        reason: "not an IP listener".to_string(),
    })?;
    info!(addr = %local, "state server listening");

    let handle = thread::Builder::new()
        .name("state-server".to_string())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match server.recv_timeout(config.poll_interval) {
                    Ok(Some(request)) => handle_request(&cooker, request),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "state server receive failed");
                        break;
                    }
                }
            }
            info!("state server stopped");
        })
        .map_err(ServerError::Spawn)?;
    Ok((local, handle))
}

fn handle_request<P: PinProvider>(cooker: &Cooker<P>, mut request: Request) {
    let content_type = request
        .headers()
        .iter()
        .find(|header| header.field.equiv("Content-Type"))
        .map(|header| header.value.as_str().to_string());

    let mut body = String::new();
    if let Err(e) = request.as_reader().take(MAX_BODY).read_to_string(&mut body) {
        debug!(error = %e, "unreadable request body");
        let _ = request.respond(Response::from_string("Bad Request").with_status_code(400));
        return;
    }

    let reply = route(
        cooker,
        request.method(),
        request.url(),
        content_type.as_deref(),
        &body,
    );
    debug!(method = %request.method(), url = request.url(), status = reply.status, "request");

    let mut response = Response::from_string(reply.body).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()) {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        debug!(error = %e, "failed to send response");
    }
}
