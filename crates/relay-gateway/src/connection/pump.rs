//! Connection pumps
//!
//! Two tasks per connection: the read pump pulls frames off the socket
//! and submits them to the hub, the write pump drains the bounded
//! outbound queue onto the socket and keeps the transport alive with
//! periodic pings. The socket is the only thing either task blocks on.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::connection::{Connection, ConnectionReceiver};
use crate::hub::Hub;
use crate::protocol::{reason, Event};

/// Deadline for a single socket write
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for hearing anything from the peer
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Ping cadence; kept under the read deadline so a healthy peer always
/// answers in time
const PING_PERIOD: Duration = Duration::from_secs(54);

/// Drain the outbound queue onto the socket.
///
/// Exits when the queue closes, the close signal fires, or a write
/// fails or times out. A close frame is attempted on every exit path
/// so the peer sees an orderly shutdown when the transport allows it.
pub async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut receiver: ConnectionReceiver,
    connection: Arc<Connection>,
) {
    let mut ping = interval(PING_PERIOD);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            frame = receiver.frames.recv() => {
                let Some(text) = frame else {
                    break;
                };
                match timeout(WRITE_TIMEOUT, sink.send(Message::Text(text.into()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(
                            connection_id = %connection.id(),
                            error = %e,
                            "socket write failed"
                        );
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(
                            connection_id = %connection.id(),
                            "socket write timed out"
                        );
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                if timeout(WRITE_TIMEOUT, sink.send(Message::Ping(Vec::new())))
                    .await
                    .map_or(true, |r| r.is_err())
                {
                    tracing::debug!(
                        connection_id = %connection.id(),
                        "ping failed, peer unreachable"
                    );
                    break;
                }
            }
            changed = receiver.closed.changed() => {
                if changed.is_err() || *receiver.closed.borrow() {
                    tracing::debug!(
                        connection_id = %connection.id(),
                        "close signal received"
                    );
                    break;
                }
            }
        }
    }

    let _ = timeout(WRITE_TIMEOUT, sink.send(Message::Close(None))).await;
    let _ = sink.close().await;
}

/// Pull frames off the socket and hand them to the hub.
///
/// Events arriving without a sender get the connection's authenticated
/// user id filled in. Malformed frames earn this connection an error
/// event; they never reach the hub.
pub async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    hub: Arc<Hub>,
    connection: Arc<Connection>,
) {
    loop {
        let frame = match timeout(READ_TIMEOUT, stream.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                tracing::debug!(
                    connection_id = %connection.id(),
                    error = %e,
                    "socket read failed"
                );
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::info!(
                    connection_id = %connection.id(),
                    user_id = %connection.user_id(),
                    "peer silent past read deadline"
                );
                break;
            }
        };

        match frame {
            Message::Text(text) => {
                let Ok(mut event) = serde_json::from_str::<Event>(&text) else {
                    tracing::debug!(
                        connection_id = %connection.id(),
                        "malformed frame rejected"
                    );
                    reject_frame(&connection);
                    continue;
                };
                if event.from.is_empty() {
                    event.from = connection.user_id().as_str().to_string();
                }
                if hub.submit(event).await.is_err() {
                    break;
                }
            }
            // Pongs answer our pings; either way the read deadline reset
            // above is the liveness signal
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Binary(_) => {
                tracing::debug!(
                    connection_id = %connection.id(),
                    "binary frame rejected"
                );
                reject_frame(&connection);
            }
            Message::Close(_) => {
                tracing::debug!(connection_id = %connection.id(), "peer closed");
                break;
            }
        }
    }
}

/// Send an `error` event to this connection only; a full queue here is
/// not worth a disconnect
fn reject_frame(connection: &Connection) {
    let event = Event::error(connection.user_id().as_str(), reason::INVALID_EVENT);
    if let Ok(json) = serde_json::to_string(&event) {
        let _ = connection.enqueue(json);
    }
}
