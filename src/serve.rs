//! Dev server and live reload.
//!
//! The HTTP side serves the destination root as static content from a
//! current-thread tokio runtime on a dedicated thread. The reload side is a
//! plain websocket endpoint: browser tabs connect to it, and every `()` sent
//! on the returned channel broadcasts a `"reload"` message to all of them.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use axum::Router;
use camino::Utf8PathBuf;
use console::style;
use tower_http::services::ServeDir;
use tungstenite::WebSocket;

pub const SERVE_PORT: u16 = 8000;

/// How many idle browser connections to keep around.
const MAX_CLIENTS: usize = 10;

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Address browsers should load once the dev server is up.
pub fn serve_url() -> String {
    format!("http://localhost:{SERVE_PORT}/")
}

/// Serve `dest` over HTTP on [`SERVE_PORT`].
pub fn start_http(dest: Utf8PathBuf) -> JoinHandle<Result<(), anyhow::Error>> {
    let url = style(serve_url()).yellow();
    tracing::info!(%url, "starting the dev server");

    thread::spawn(move || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(serve(dest))
    })
}

async fn serve(dest: Utf8PathBuf) -> Result<(), anyhow::Error> {
    let address = SocketAddr::from(([127, 0, 0, 1], SERVE_PORT));
    let listener = tokio::net::TcpListener::bind(address).await?;

    let router = Router::new().fallback_service(ServeDir::new(dest.as_std_path()));
    axum::serve(listener, router).await?;

    Ok(())
}

/// Open the reload websocket. Returns the port browsers should connect to
/// and the channel pipelines signal after writing output.
pub fn start_reload() -> std::io::Result<(u16, Sender<()>)> {
    // Prefer a fixed port so the client snippet stays stable across runs.
    let listener = match TcpListener::bind("127.0.0.1:1337") {
        Ok(listener) => listener,
        Err(_) => TcpListener::bind("127.0.0.1:0")?,
    };
    let port = listener.local_addr()?.port();

    let clients: Clients = Arc::new(Mutex::new(Vec::new()));
    accept_clients(listener, clients.clone());
    let tx = broadcast_reloads(clients);

    tracing::debug!(port, "reload channel open");
    Ok((port, tx))
}

fn accept_clients(listener: TcpListener, clients: Clients) -> JoinHandle<()> {
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            match tungstenite::accept(stream) {
                Ok(socket) => clients.lock().unwrap().push(socket),
                Err(err) => tracing::debug!("websocket handshake failed: {err}"),
            }
        }
    })
}

/// Point the default browser at the dev server. Failure is harmless, the
/// address was already logged.
pub fn open_browser() {
    let _ = open::that(serve_url());
}

fn broadcast_reloads(clients: Clients) -> Sender<()> {
    let (tx, rx) = std::sync::mpsc::channel();

    thread::spawn(move || {
        while rx.recv().is_ok() {
            let mut clients = clients.lock().unwrap();

            clients.retain_mut(|socket| match socket.send("reload".into()) {
                Ok(()) => true,
                Err(tungstenite::Error::Io(err))
                    if err.kind() == std::io::ErrorKind::BrokenPipe =>
                {
                    false
                }
                Err(err) => {
                    tracing::debug!("reload send failed: {err}");
                    true
                }
            });

            // Drop the oldest connections beyond the cap.
            let len = clients.len();
            if len > MAX_CLIENTS {
                for mut socket in clients.drain(0..len - MAX_CLIENTS) {
                    socket.close(None).ok();
                }
            }
        }
    });

    tx
}
