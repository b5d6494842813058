use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use retro_types::api::Claims;
use retro_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket may stay silent before sending `Identify`.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

type Subscription = Option<(Uuid, broadcast::Receiver<GatewayEvent>)>;

/// Connection timings.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub identify_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            identify_timeout: IDENTIFY_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }
}

/// Handle a single WebSocket connection: identify, then relay events of the
/// retrospective the client follows until either side goes away.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, jwt_secret: String) {
    handle_connection_with(socket, dispatcher, jwt_secret, ConnectionOptions::default()).await
}

pub async fn handle_connection_with(
    socket: WebSocket,
    dispatcher: Dispatcher,
    jwt_secret: String,
    options: ConnectionOptions,
) {
    let (mut sender, mut receiver) = socket.split();

    let identified = wait_for_identify(&mut receiver, &jwt_secret, options.identify_timeout).await;
    let Some(user_id) = identified else {
        warn!("WebSocket client failed to identify, closing");
        return;
    };

    info!("{} connected to gateway", user_id);

    if !send_event(&mut sender, &GatewayEvent::Ready { user_id }).await {
        return;
    }

    run_connection_loop(sender, receiver, &dispatcher, user_id, options.heartbeat_interval).await;
    info!("{} disconnected from gateway", user_id);
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: &Dispatcher,
    user_id: Uuid,
    heartbeat_interval: Duration,
) {
    let mut subscription: Subscription = None;

    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    heartbeat.tick().await;
    let mut pong_received = true;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            result = next_event(&mut subscription) => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut sender, &event).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("{} lagged by {} events", user_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        subscription = None;
                    }
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<GatewayCommand>(&text) {
                            Ok(cmd) => handle_command(dispatcher, user_id, cmd, &mut subscription).await,
                            Err(e) => warn!(
                                "{} bad command: {} -- raw: {}",
                                user_id,
                                e,
                                text.chars().take(200).collect::<String>()
                            ),
                        }
                    }
                    Some(Ok(Message::Pong(_))) => pong_received = true,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = heartbeat.tick() => {
                if std::mem::replace(&mut pong_received, false) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                        break;
                    }
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    unsubscribe(dispatcher, &mut subscription).await;
}

/// Waits on the followed retrospective, or forever when there is none.
async fn next_event(
    subscription: &mut Subscription,
) -> Result<GatewayEvent, broadcast::error::RecvError> {
    match subscription {
        Some((_, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_command(
    dispatcher: &Dispatcher,
    user_id: Uuid,
    cmd: GatewayCommand,
    subscription: &mut Subscription,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::Subscribe { retrospective_id } => {
            unsubscribe(dispatcher, subscription).await;
            info!("{} following retrospective {}", user_id, retrospective_id);
            let rx = dispatcher.subscribe(retrospective_id).await;
            *subscription = Some((retrospective_id, rx));
        }

        GatewayCommand::Unsubscribe => unsubscribe(dispatcher, subscription).await,
    }
}

async fn unsubscribe(dispatcher: &Dispatcher, subscription: &mut Subscription) {
    if let Some((retro_id, rx)) = subscription.take() {
        drop(rx);
        dispatcher.prune(retro_id).await;
        debug!("Stopped following retrospective {}", retro_id);
    }
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &GatewayEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize gateway event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    jwt_secret: &str,
    timeout: Duration,
) -> Option<Uuid> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    return decode_token(&token, jwt_secret);
                }
            }
        }
        None
    };

    tokio::time::timeout(timeout, identify).await.ok().flatten()
}

/// Validate a bearer token and return the user it was issued to.
pub fn decode_token(token: &str, jwt_secret: &str) -> Option<Uuid> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}
