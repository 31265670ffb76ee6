pub mod handlers;

use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::protocol::{ServerCodec, ServerMessage};
use crate::state::{AppState, Connection};
use crate::types::PlayerId;

/// Error code for lines that are not a valid client message
pub const PARSE_ERROR: &str = "PARSE_ERROR";

/// Drive one client connection until it closes, is evicted, or the server
/// shuts down. The player (if it joined) is unregistered on the way out.
pub async fn handle_connection<S>(stream: S, peer: String, state: Arc<AppState>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let id = state.next_connection_id();
    let (conn, outbox) = Connection::new(id, state.config.outbox_capacity);
    let (sink, mut frames) = Framed::new(stream, ServerCodec::new()).split();

    tracing::info!("Connection {} opened from {}", id, peer);

    let writer = tokio::spawn(write_loop(sink, outbox, conn.closed.clone(), id));

    reply(
        &conn,
        ServerMessage::waiting("Connected. Send a join message with your name to play"),
    );

    loop {
        tokio::select! {
            frame = frames.next() => {
                match frame {
                    Some(Ok(Ok(msg))) => {
                        tracing::debug!("Connection {} sent {:?}", id, msg);
                        if let Some(response) = handlers::handle_message(msg, &conn, &state).await {
                            if !reply(&conn, response) {
                                break;
                            }
                        }
                    }
                    Some(Ok(Err(e))) => {
                        tracing::debug!("Connection {} sent malformed message: {}", id, e);
                        let response = ServerMessage::error(PARSE_ERROR, format!("Invalid message: {}", e));
                        if !reply(&conn, response) {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Connection {} read error: {}", id, e);
                        break;
                    }
                    None => {
                        tracing::debug!("Connection {} closed by peer", id);
                        break;
                    }
                }
            }

            _ = conn.closed.cancelled() => {
                tracing::debug!("Connection {} closed by server", id);
                break;
            }

            _ = state.shutdown.cancelled() => {
                break;
            }
        }
    }

    state.unregister_player(id).await;
    conn.closed.cancel();
    drop(conn);

    if let Err(e) = writer.await {
        tracing::error!("Writer task for connection {} panicked: {}", id, e);
    }

    tracing::info!("Connection {} from {} finished", id, peer);
}

/// Queue a direct reply. False means the mailbox is gone or full and the
/// session should end.
fn reply(conn: &Connection, msg: ServerMessage) -> bool {
    match conn.outbox.try_send(msg) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Dropping connection {}: {}", conn.id, e);
            false
        }
    }
}

/// Drain the mailbox into the socket until either side goes away
async fn write_loop<W>(
    mut sink: W,
    mut outbox: mpsc::Receiver<ServerMessage>,
    closed: CancellationToken,
    id: PlayerId,
) where
    W: futures::Sink<ServerMessage, Error = crate::protocol::CodecError> + Unpin,
{
    loop {
        let msg = tokio::select! {
            biased;
            msg = outbox.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
            _ = closed.cancelled() => break,
        };

        tokio::select! {
            result = sink.send(msg) => {
                if let Err(e) = result {
                    tracing::warn!("Write to connection {} failed: {}", id, e);
                    break;
                }
            }
            _ = closed.cancelled() => break,
        }
    }

    // no more writes will succeed; make sure the reader stops too
    closed.cancel();
    outbox.close();
}
