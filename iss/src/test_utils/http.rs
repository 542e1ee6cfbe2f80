use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// HTTP server on a loopback port that answers every request the same way.
///
/// The server stops when dropped.
#[derive(Debug)]
pub struct LocalHttpServer {
    url: String,
    task: JoinHandle<()>,
}

impl LocalHttpServer {
    /// Answers every request with `status` (e.g. `"200 OK"`) and `body`.
    pub async fn respond_with(status: &str, body: &str) -> Self {
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );

        Self::spawn(move |listener| async move {
            while let Ok((stream, _)) = listener.accept().await {
                let response = response.clone();
                tokio::spawn(async move { answer(stream, response.as_bytes()).await });
            }
        })
        .await
    }

    /// Accepts connections but never answers.
    pub async fn unresponsive() -> Self {
        Self::spawn(|listener| async move {
            // Streams are held open so clients wait instead of seeing a reset.
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        })
        .await
    }

    async fn spawn<F, Fut>(serve: F) -> Self
    where
        F: FnOnce(TcpListener) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind a local port");
        let address = listener
            .local_addr()
            .expect("Failed to read the local address");

        Self {
            url: format!("http://{address}/iss-now.json"),
            task: tokio::spawn(serve(listener)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for LocalHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Reads the request head, then writes `response` and closes the stream.
async fn answer(mut stream: TcpStream, response: &[u8]) {
    let mut request = Vec::new();
    let mut buffer = [0u8; 1024];

    loop {
        match stream.read(&mut buffer).await {
            Ok(0) | Err(_) => return,
            Ok(read) => request.extend_from_slice(&buffer[..read]),
        }
        if request.windows(4).any(|window| window == b"\r\n\r\n") {
            break;
        }
    }

    let _ = stream.write_all(response).await;
    let _ = stream.shutdown().await;
}
