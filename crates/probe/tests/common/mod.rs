//! Local HTTP stand-in for the game API

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const PROFILES: &str = r#"[
  {"id": 1764998591846, "name": "Маша", "stars": 12,
   "numberRacingData": {"learningStage": 1, "difficulty": 1}},
  {"id": 1765000000000, "name": "Петя", "stars": 0}
]"#;

fn route(path: &str) -> (u16, String) {
    match path {
        "/api/health" => (200, r#"{"status":"ok","timestamp":"2025-12-06T10:00:00.000Z"}"#.to_string()),
        "/api/profiles" => (200, PROFILES.to_string()),
        "/api/profiles/1764998591846" => (
            200,
            r#"{"id": 1764998591846, "name": "Маша", "stars": 12,
                "numberRacingData": {"learningStage": 1, "difficulty": 1}}"#
                .to_string(),
        ),
        _ => (404, r#"{"error":"Profile not found"}"#.to_string()),
    }
}

/// Answers each connection once, routed by request path
pub async fn spawn_stub() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }

                let request = String::from_utf8_lossy(&buf);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = route(&path);
                let reason = if status == 200 { "OK" } else { "Not Found" };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// An address nothing listens on
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
