use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use hearth_core::Household;
use hearth_types::api::Claims;
use hearth_types::events::{GatewayCommand, GatewayEvent};

use crate::feed::{CollectionFilter, Feed, FeedSender, snapshot};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection: Identify, Ready, then snapshots
/// until either side goes away.
pub async fn handle_connection(socket: WebSocket, household: Household, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let claims = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(claims) => claims,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };
    let username = claims.sub.clone();

    info!("{} connected to gateway", username);

    // Step 2: Send Ready event
    let ready = GatewayEvent::Ready {
        username: username.clone(),
        is_admin: claims.is_admin,
    };
    if !send_event(&mut sender, &ready).await {
        return;
    }

    // Step 3: Subscribe; the current snapshots are queued right away
    let feed = match Feed::open(&household).await {
        Ok(feed) => feed,
        Err(e) => {
            warn!("Could not subscribe {} to the household: {}", username, e);
            return;
        }
    };

    run_connection_loop(sender, receiver, household, feed, username.clone()).await;
    info!("{} disconnected from gateway", username);
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    household: Household,
    mut feed: Feed,
    username: String,
) {
    let filter = Arc::new(CollectionFilter::default());
    let send_filter = filter.clone();
    let resend = feed.sender();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward snapshots -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = feed.recv() => {
                    if !send_filter.allows(&event) {
                        continue;
                    }
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        // The feed drops here and its subscriptions end with it.
    });

    // Read commands from client
    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&household, &username_recv, cmd, &filter, &resend).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            username_recv,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<Claims> {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some(token_data.claims);
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

async fn handle_command(
    household: &Household,
    username: &str,
    cmd: GatewayCommand,
    filter: &CollectionFilter,
    resend: &FeedSender,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::Subscribe { collections } => {
            info!("{} subscribing to {:?}", username, collections);
            // Newly wanted collections get their current state right away.
            for collection in filter.replace(collections) {
                if let Some(event) = snapshot(household, collection).await {
                    resend.send(event);
                }
            }
        }
    }
}

/// Serialize and send one event. Returns false once the socket is gone.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &GatewayEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Dropping unserializable event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use hearth_db::LocalStore;
    use hearth_types::Collection;

    async fn drain(feed: &mut Feed) -> Vec<Option<Collection>> {
        let mut seen = vec![];
        while let Ok(event) = tokio::time::timeout(Duration::from_millis(50), feed.recv()).await {
            seen.push(event.collection());
        }
        seen
    }

    #[tokio::test]
    async fn test_subscribe_resends_newly_wanted() {
        let household = Household::new(Arc::new(LocalStore::in_memory()));
        let mut feed = Feed::open(&household).await.unwrap();
        drain(&mut feed).await;
        let filter = CollectionFilter::default();

        let narrow = GatewayCommand::Subscribe {
            collections: vec![Collection::Messages],
        };
        handle_command(&household, "User1", narrow, &filter, &feed.sender()).await;
        assert!(drain(&mut feed).await.is_empty());

        let everything = GatewayCommand::Subscribe { collections: vec![] };
        handle_command(&household, "User1", everything, &filter, &feed.sender()).await;
        assert_eq!(
            drain(&mut feed).await,
            vec![
                Some(Collection::Rules),
                Some(Collection::Approvals),
                Some(Collection::Settings),
            ]
        );
    }

    #[tokio::test]
    async fn test_identify_after_ready_is_ignored() {
        let household = Household::new(Arc::new(LocalStore::in_memory()));
        let mut feed = Feed::open(&household).await.unwrap();
        drain(&mut feed).await;
        let filter = CollectionFilter::default();

        let identify = GatewayCommand::Identify {
            token: "ignored".into(),
        };
        handle_command(&household, "User1", identify, &filter, &feed.sender()).await;
        assert!(drain(&mut feed).await.is_empty());
        assert!(filter.allows(&GatewayEvent::RulesSnapshot { rules: vec![] }));
    }
}
