//! Admin request/response endpoint.
//!
//! A separate listener serving line-delimited JSON: one request object per
//! line in, one response object per line out. The surface is intentionally
//! tiny - a single profile query - and lives outside the game protocol so
//! operational tooling never competes with game traffic.

use std::sync::Arc;

use parlor_core::{PlayerService, StorageError};
use serde::Deserialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::watch,
};

#[derive(Debug, Deserialize)]
struct AdminRequest {
    method: String,
    user_id: Option<i64>,
}

/// Accept admin connections until shutdown.
pub(crate) async fn serve(
    listener: TcpListener,
    service: Arc<PlayerService>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "admin connection accepted");
                        let service = service.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, service).await;
                        });
                    }
                    Err(err) => tracing::error!(%err, "admin accept failed"),
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, service: Arc<PlayerService>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }

        let mut response = serde_json::to_vec(&respond(&service, &line)).unwrap_or_default();
        response.push(b'\n');

        if write_half.write_all(&response).await.is_err() {
            break;
        }
    }
}

fn respond(service: &PlayerService, line: &str) -> serde_json::Value {
    let request: AdminRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => return error_response(format!("malformed request: {err}")),
    };

    match request.method.as_str() {
        "get_player_with_stats" => {
            let Some(user_id) = request.user_id else {
                return error_response("get_player_with_stats requires user_id".to_string());
            };
            match service.get_player_with_stats(user_id) {
                Ok(result) => serde_json::json!({
                    "player": result.player,
                    "stats": result.stats,
                }),
                Err(StorageError::RecordNotFound) => {
                    error_response(format!("player {user_id} not found"))
                }
                Err(err) => error_response(err.to_string()),
            }
        }
        other => error_response(format!("unknown method: {other}")),
    }
}

fn error_response(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}
