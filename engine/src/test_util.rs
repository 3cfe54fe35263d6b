//! Stub txt2img services and fixtures shared by the unit tests.

use std::time::Duration;

use axum::Router;
use tokio::{
    net::{TcpListener, TcpSocket, TcpStream},
    time::timeout,
};

pub const TXT2IMG_PATH: &str = "/sdapi/v1/txt2img";

/// A complete 1x1 PNG.
pub const PNG_1X1_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Serves `router` on an ephemeral local port and returns the txt2img URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}{TXT2IMG_PATH}")
}

/// A listener whose accept queue is full, so new connections never complete.
pub struct SaturatedServer {
    pub url: String,
    _listener: TcpListener,
    _queued: Vec<TcpStream>,
}

/// Listens with a backlog of one, never accepts, and fills the queue. Further
/// SYNs are dropped, so a client stays stuck in the connect phase.
pub async fn saturated_server() -> SaturatedServer {
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(1).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut queued = vec![];
    for _ in 0..8 {
        if let Ok(Ok(stream)) = timeout(Duration::from_millis(100), TcpStream::connect(addr)).await {
            queued.push(stream);
        }
    }

    SaturatedServer {
        url: format!("http://{addr}{TXT2IMG_PATH}"),
        _listener: listener,
        _queued: queued,
    }
}

/// A URL on a port nobody listens on.
pub async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}{TXT2IMG_PATH}")
}

/// Asserts `name` looks like `{prefix}-YYYYMMDD-HHMMSS.png`.
pub fn assert_timestamped_png(name: &str, prefix: &str) {
    let stamp = name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_suffix(".png"))
        .unwrap_or_else(|| panic!("bad file name: {name}"));
    let (date, time) = stamp
        .split_once('-')
        .unwrap_or_else(|| panic!("bad timestamp: {stamp}"));
    assert_eq!(date.len(), 8, "{name}");
    assert_eq!(time.len(), 6, "{name}");
    assert!(
        date.chars().chain(time.chars()).all(|c| c.is_ascii_digit()),
        "{name}"
    );
}
