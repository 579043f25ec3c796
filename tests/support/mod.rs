// ABOUTME: Local fixture servers for integration tests
// Scripted HTTP responses (JSON and chunked SSE) plus a scriptable WebSocket peer

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// One scripted HTTP exchange. The server answers accepted connections with
/// the scripts in order, one connection per script.
pub enum Scripted {
    /// Plain JSON response with a status code.
    Json { status: u16, body: String },
    /// Chunked `text/event-stream` response; each chunk is written after
    /// its delay, then the stream is terminated cleanly.
    Sse { chunks: Vec<(u64, String)> },
    /// Like `Sse` but the connection is dropped mid-body, simulating a
    /// network failure before the stream completes.
    SseAbort { chunks: Vec<(u64, String)> },
}

pub struct ScriptedServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    pub async fn start(scripts: Vec<Scripted>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("fixture listener should bind");
        let addr = listener.local_addr().expect("fixture listener address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            for script in scripts {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut socket).await;
                match script {
                    Scripted::Json { status, body } => {
                        let response = format!(
                            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            reason(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    }
                    Scripted::Sse { chunks } => {
                        write_sse_head(&mut socket).await;
                        write_sse_chunks(&mut socket, chunks).await;
                        let _ = socket.write_all(b"0\r\n\r\n").await;
                        let _ = socket.shutdown().await;
                    }
                    Scripted::SseAbort { chunks } => {
                        write_sse_head(&mut socket).await;
                        write_sse_chunks(&mut socket, chunks).await;
                        // Drop without the terminating chunk.
                    }
                }
            }
        });

        Self { base_url, handle }
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn write_sse_head(socket: &mut TcpStream) {
    let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.flush().await;
}

async fn write_sse_chunks(socket: &mut TcpStream, chunks: Vec<(u64, String)>) {
    for (delay_ms, data) in chunks {
        if delay_ms > 0 {
            sleep(Duration::from_millis(delay_ms)).await;
        }
        let framed = format!("{:x}\r\n{}\r\n", data.len(), data);
        let _ = socket.write_all(framed.as_bytes()).await;
        let _ = socket.flush().await;
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Error",
    }
}

/// Read one HTTP request, including its body when Content-Length is set.
async fn read_request(socket: &mut TcpStream) {
    let mut buffer = Vec::new();
    let mut scratch = [0u8; 1024];
    loop {
        let Ok(read) = socket.read(&mut scratch).await else {
            return;
        };
        if read == 0 {
            return;
        }
        buffer.extend_from_slice(&scratch[..read]);

        let Some(head_end) = find_subsequence(&buffer, b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buffer[..head_end]);
        let content_length = head
            .lines()
            .find_map(|line| {
                line.to_ascii_lowercase()
                    .strip_prefix("content-length:")
                    .map(|value| value.trim().parse::<usize>().unwrap_or(0))
            })
            .unwrap_or(0);

        let mut body_read = buffer.len() - (head_end + 4);
        while body_read < content_length {
            let Ok(read) = socket.read(&mut scratch).await else {
                return;
            };
            if read == 0 {
                return;
            }
            body_read += read;
        }
        return;
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// One scripted action the WebSocket peer performs after the handshake.
pub enum WsAction {
    SendText(String),
    SendBinary(Vec<u8>),
    Wait(u64),
    Close,
}

/// Accept one WebSocket connection, report its Authorization header, run
/// the scripted actions, and forward every client frame for assertions.
/// The connection is held open after the script unless `Close` was sent.
pub async fn ws_server(
    actions: Vec<WsAction>,
) -> (
    String,
    mpsc::UnboundedReceiver<Message>,
    oneshot::Receiver<Option<String>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("fixture listener should bind");
    let addr = listener.local_addr().expect("fixture listener address");
    let base_url = format!("http://{addr}");

    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let (auth_tx, auth_rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let auth = request
                .headers()
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let _ = auth_tx.send(auth);
            Ok(response)
        };
        let websocket = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .expect("fixture websocket handshake");
        let (mut sink, mut source) = websocket.split();

        tokio::spawn(async move {
            while let Some(Ok(frame)) = source.next().await {
                let _ = frame_tx.send(frame);
            }
        });

        for action in actions {
            match action {
                WsAction::SendText(text) => {
                    let _ = sink.send(Message::Text(text)).await;
                }
                WsAction::SendBinary(data) => {
                    let _ = sink.send(Message::Binary(data)).await;
                }
                WsAction::Wait(ms) => sleep(Duration::from_millis(ms)).await,
                WsAction::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                }
            }
        }

        // Hold the connection so client-initiated teardown can be observed.
        std::future::pending::<()>().await;
    });

    (base_url, frame_rx, auth_rx)
}
