//! TCP listener and accept loop

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::config::ConfigError;
use crate::questions::QuestionError;
use crate::session;
use crate::state::AppState;

/// Anything that stops the server from starting
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("question set: {0}")]
    Questions(#[from] QuestionError),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Accept connections until shutdown, one session task per connection.
/// Returns after every session has wound down.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    let local = listener.local_addr()?;
    tracing::info!("Quiz server listening on {}", local);

    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        if let Err(e) = socket.set_nodelay(true) {
                            tracing::debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
                        }
                        sessions.spawn(session::handle_connection(
                            socket,
                            peer.to_string(),
                            Arc::clone(&state),
                        ));
                    }
                    Err(e) => {
                        // per-connection failure (peer reset, fd limit); keep accepting
                        tracing::warn!("Failed to accept connection: {}", e);
                    }
                }
            }

            _ = state.shutdown.cancelled() => {
                tracing::info!("Accept loop stopping");
                break;
            }
        }

        while let Some(finished) = sessions.try_join_next() {
            if let Err(e) = finished {
                tracing::error!("Session task failed: {}", e);
            }
        }
    }

    drop(listener);
    while let Some(finished) = sessions.join_next().await {
        if let Err(e) = finished {
            tracing::error!("Session task failed: {}", e);
        }
    }

    tracing::info!("All sessions closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ClientCodec, ServerMessage};
    use crate::state::test_support::*;
    use futures::StreamExt;
    use tokio::net::TcpStream;
    use tokio_util::codec::Framed;

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        match bind(&addr).await {
            Err(ServerError::Bind { addr: reported, .. }) => assert_eq!(reported, addr),
            other => panic!("Expected Bind error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_serve_greets_and_stops_on_shutdown() {
        let state = state_with(vec![question(1, 100, 10)]);
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(listener, Arc::clone(&state)));

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = Framed::new(stream, ClientCodec::new());
        let greeting = client.next().await.unwrap().unwrap().unwrap();
        assert!(matches!(greeting, ServerMessage::Waiting { .. }));

        state.shutdown();
        server.await.unwrap().unwrap();

        // the session closed our socket
        assert!(client.next().await.is_none());
    }
}
