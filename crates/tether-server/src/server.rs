//! WebSocket server implementation.
//!
//! Accepts connections, keeps per-connection session state, and routes
//! JSON-RPC messages to handlers. Every operation is an independent
//! unit of work: connections share nothing but the store handle, so
//! concurrency is bounded only by the store's transaction semantics.

use crate::handlers::{
    handle_authenticate, handle_stats, handle_status, handle_toggle, Session,
};
use crate::protocol::{
    AuthenticateParams, Request, Response, StatsParams, StatusParams, ToggleParams,
};
use crate::SharedStore;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:7433".parse().unwrap(),
        }
    }
}

/// The Tether WebSocket server.
pub struct FollowServer {
    config: ServerConfig,
    store: SharedStore,
    account_events: broadcast::Sender<tether_core::AccountEvent>,
}

impl FollowServer {
    /// Creates a new server over the given store.
    pub fn new(store: SharedStore, config: ServerConfig) -> Self {
        let (account_events, _) = broadcast::channel(1024);
        Self {
            config,
            store,
            account_events,
        }
    }

    /// Handle the account subsystem publishes creation events on.
    pub fn account_events(&self) -> broadcast::Sender<tether_core::AccountEvent> {
        self.account_events.clone()
    }

    /// Runs the server, accepting connections forever.
    ///
    /// Also spawns the lifecycle hook subscribed to the account event
    /// stream.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tokio::spawn(crate::lifecycle::run_lifecycle_hook(
            self.store.clone(),
            self.account_events.subscribe(),
        ));

        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("tether server listening on {}", self.config.addr);

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("new connection from {}", addr);
                    let store = self.store.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, store).await {
                            error!("connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("accept error: {}", e);
                }
            }
        }
    }
}

/// Handles a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    store: SharedStore,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    debug!("websocket established with {}", addr);

    let (mut write, mut read) = ws_stream.split();
    let mut session = Session::default();

    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!("message error from {}: {}", addr, e);
                break;
            }
        };

        if msg.is_close() {
            debug!("client {} disconnected", addr);
            break;
        }

        if msg.is_ping() {
            write.send(Message::Pong(msg.into_data())).await?;
            continue;
        }

        if msg.is_text() {
            let text = msg.to_text().unwrap_or("");
            let response = process_message(text, store.clone(), &mut session).await;
            let json = serde_json::to_string(&response)?;
            write.send(Message::Text(json)).await?;
        }
    }

    debug!("connection closed: {}", addr);
    Ok(())
}

/// Parses one JSON-RPC message and routes it to its handler.
pub(crate) async fn process_message(
    text: &str,
    store: SharedStore,
    session: &mut Session,
) -> Response {
    let request: Request = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(_) => return Response::parse_error(),
    };

    let id = request.id.clone();
    let method = request.method.as_str();
    debug!("processing method: {}", method);

    match method {
        "session.authenticate" => {
            match serde_json::from_value::<AuthenticateParams>(request.params) {
                Ok(params) => handle_authenticate(session, id, params).await,
                Err(e) => Response::invalid_params(id, e.to_string()),
            }
        }

        "follow.toggle" => match serde_json::from_value::<ToggleParams>(request.params) {
            Ok(params) => handle_toggle(store, session, id, params).await,
            Err(e) => Response::invalid_params(id, e.to_string()),
        },

        "follow.stats" => match serde_json::from_value::<StatsParams>(request.params) {
            Ok(params) => handle_stats(store, session, id, params).await,
            Err(e) => Response::invalid_params(id, e.to_string()),
        },

        "follow.status" => match serde_json::from_value::<StatusParams>(request.params) {
            Ok(params) => handle_status(store, session, id, params).await,
            Err(e) => Response::invalid_params(id, e.to_string()),
        },

        _ => Response::method_not_found(id, method),
    }
}
