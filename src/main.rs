mod aggregate;
mod cards;
mod config;
mod error;
mod membership;
mod permissions;
mod registry;
mod session;
mod store;
mod types;
mod view;

use std::sync::Arc;

use askama::Template;
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::ServerConfig;
use crate::error::RoomError;
use crate::permissions::PermissionGuard;
use crate::registry::Registry;
use crate::session::RoomHandle;
use crate::store::{MemoryStore, Subscription};
use crate::types::*;
use crate::view::RoomView;

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
    config: ServerConfig,
}

type SocketSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

// ─── Templates ────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate;

struct PlayerRow {
    name: String,
    mark: String,
}

#[derive(Template)]
#[template(path = "room.html")]
struct RoomTemplate {
    room_id: String,
    link: String,
    name: String,
    mode: String,
    creator: String,
    players: Vec<PlayerRow>,
    average: String,
}

impl RoomTemplate {
    fn new(view: &RoomView, link: String) -> Self {
        let players = view
            .players
            .iter()
            .map(|p| PlayerRow {
                name: p.name.clone(),
                mark: match &p.display {
                    Some(display) => display.clone(),
                    None if p.voted => "✔️".to_string(),
                    None => "—".to_string(),
                },
            })
            .collect();

        Self {
            room_id: view.room_id.to_string(),
            link,
            name: view.name.clone(),
            mode: view.mode.to_string(),
            creator: view.creator.clone().unwrap_or_default(),
            players,
            average: view.average.clone().unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "not_found.html")]
struct NotFoundTemplate {
    room_id: String,
}

// ─── Routes ───────────────────────────────────────────────────────

async fn index_page() -> impl IntoResponse {
    Html(IndexTemplate.to_string())
}

async fn room_page(Path(room_id): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    let id = RoomId(room_id);
    match state.registry.store().read_once(&id).await {
        Ok(Some(room)) => {
            let view = RoomView::new(&id, &room);
            let link = state.config.room_link(id.as_str());
            Html(RoomTemplate::new(&view, link).to_string()).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Html(NotFoundTemplate { room_id: id.0 }.to_string()),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Failed to read room {}: {}", id, e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/room/{room_id}", get(room_page))
        .route("/ws", get(ws_handler))
        .nest_service("/static", ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// The room a socket joined, the name it joined under, and the task forwarding
/// that room's changes to the socket.
struct Membership {
    handle: RoomHandle,
    player: String,
    feed: JoinHandle<()>,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let sender: SocketSender = Arc::new(Mutex::new(sender));

    let socket_id = uuid::Uuid::new_v4().to_string();
    tracing::info!("WebSocket connected: {}", socket_id);

    let mut membership: Option<Membership> = None;

    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else { continue };

        let client_msg: ClientMsg = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Invalid message: {}", e);
                continue;
            }
        };

        if let Err(e) = handle_message(client_msg, &state, &sender, &mut membership).await {
            tracing::warn!("Socket {}: {}", socket_id, e);
            send_msg(&sender, &ServerMsg::ErrorMessage {
                kind: e.kind().to_string(),
                message: e.to_string(),
            })
            .await;
        }
    }

    // Socket disconnected
    tracing::info!("WebSocket disconnected: {}", socket_id);
    if let Some(previous) = membership.take() {
        leave_quietly(previous).await;
    }
}

fn not_joined() -> RoomError {
    RoomError::Validation("join a room first".to_string())
}

async fn handle_message(
    msg: ClientMsg,
    state: &AppState,
    sender: &SocketSender,
    membership: &mut Option<Membership>,
) -> Result<(), RoomError> {
    match msg {
        ClientMsg::CreateRoom { name } => {
            let room_id = state.registry.create_room(&name).await?;
            let link = state.config.room_link(room_id.as_str());
            send_msg(sender, &ServerMsg::RoomCreated { room_id, link }).await;
        }

        ClientMsg::JoinRoom { room_id, player_name } => {
            crate::membership::check_player_name(&player_name)?;
            let handle = state.registry.open(&room_id).await?;

            let same_seat = membership
                .as_ref()
                .is_some_and(|m| m.handle.room_id == room_id && m.player == player_name);
            if same_seat {
                // Rejoining under the same name only clears the vote.
                handle.join(&player_name).await?;
                return Ok(());
            }

            let subscription = state.registry.store().subscribe(&room_id).await?;
            handle.join(&player_name).await?;
            if let Some(previous) = membership.take() {
                leave_quietly(previous).await;
            }
            send_msg(sender, &ServerMsg::Joined {
                room_id: room_id.clone(),
                player_name: player_name.clone(),
            })
            .await;
            let feed = spawn_feed(
                room_id.clone(),
                player_name.clone(),
                subscription,
                sender.clone(),
            );

            tracing::info!("{} joined room {}", player_name, room_id);
            *membership = Some(Membership {
                handle,
                player: player_name,
                feed,
            });
        }

        ClientMsg::CastVote { card } => {
            let m = membership.as_ref().ok_or_else(not_joined)?;
            m.handle.cast_vote(&m.player, &card).await?;
        }

        ClientMsg::Reveal => {
            let m = membership.as_ref().ok_or_else(not_joined)?;
            m.handle.reveal(&m.player).await?;
        }

        ClientMsg::Reset => {
            let m = membership.as_ref().ok_or_else(not_joined)?;
            m.handle.reset(&m.player).await?;
        }

        ClientMsg::SetMode { mode } => {
            let m = membership.as_ref().ok_or_else(not_joined)?;
            m.handle.set_mode(&m.player, mode).await?;
        }

        ClientMsg::RenameRoom { name } => {
            let m = membership.as_ref().ok_or_else(not_joined)?;
            m.handle.rename(&m.player, &name).await?;
        }

        ClientMsg::LeaveRoom => {
            let m = membership.as_ref().ok_or_else(not_joined)?;
            m.handle.leave(&m.player).await?;
            if let Some(m) = membership.take() {
                m.feed.abort();
                tracing::info!("{} left room {}", m.player, m.handle.room_id);
                send_msg(sender, &ServerMsg::Left {
                    room_id: m.handle.room_id,
                })
                .await;
            }
        }
    }

    Ok(())
}

/// Leave on behalf of a socket that is going away. Failures only cost tidiness.
async fn leave_quietly(membership: Membership) {
    membership.feed.abort();
    if let Err(e) = membership.handle.leave(&membership.player).await {
        tracing::debug!(
            "Best-effort leave of {} from {} failed: {}",
            membership.player,
            membership.handle.room_id,
            e
        );
    }
}

/// Forward every delivered room value to the socket until the room is gone.
fn spawn_feed(
    room_id: RoomId,
    player: String,
    mut subscription: Subscription,
    sender: SocketSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(value) = subscription.next().await {
            let msg = match value {
                Some(room) => ServerMsg::RoomState {
                    room: RoomView::new(&room_id, &room),
                    allowed: PermissionGuard::allowed(&player, &room).into_iter().collect(),
                },
                None => ServerMsg::RoomClosed {
                    room_id: room_id.clone(),
                },
            };
            let closed = matches!(msg, ServerMsg::RoomClosed { .. });
            if !send_msg(&sender, &msg).await || closed {
                break;
            }
        }
    })
}

async fn send_msg(sender: &SocketSender, msg: &ServerMsg) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let mut s = sender.lock().await;
            s.send(Message::Text(json.into())).await.is_ok()
        }
        Err(e) => {
            tracing::error!("Failed to encode message: {}", e);
            false
        }
    }
}

// ─── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let base = config::config_dir();
    let server_config = match config::init(&base).and_then(|()| config::load(&base)) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store = Arc::new(MemoryStore::new(server_config.channel_capacity));
    let registry = Registry::new(
        store,
        server_config.room_id_length,
        server_config.channel_capacity,
    );

    let port = server_config.port;
    let state = AppState {
        registry,
        config: server_config,
    };

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("Failed to bind");

    tracing::info!("Planning poker server running on port {}", port);

    if let Err(e) = axum::serve(listener, app(state)).await {
        tracing::error!("Server error: {}", e);
    }
}
