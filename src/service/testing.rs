//! A throwaway HTTP server that answers a fixed sequence of requests.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use url::Url;

/// Serve `responses` in order, one connection each, and hand back the request heads that were received.
pub(crate) async fn serve(responses: Vec<(u16, &'static str)>) -> (Url, JoinHandle<Vec<String>>) {
    let raw = responses
        .into_iter()
        .map(|(status, body)| {
            format!(
                "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            )
        })
        .collect();

    serve_raw(raw).await
}

/// Like [serve] but every response is written exactly as given, malformed or not.
pub(crate) async fn serve_raw(responses: Vec<String>) -> (Url, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();

        for response in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            requests.push(read_head(&mut socket).await);

            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }

        requests
    });

    let url = Url::parse(&format!("http://{address}/")).unwrap();
    (url, handle)
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let read = socket.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..read]);
        if head.windows(4).any(|window| window == b"\r\n\r\n") {
            break;
        }
    }

    String::from_utf8_lossy(&head).to_lowercase()
}
