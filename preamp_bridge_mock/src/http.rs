use crate::main_loop::{handle_line, lock, SharedState, ERR_UNKNOWN_CMD};
use crate::protocol::{OutboundMsg, STATE_PREFIX};
use crossbeam_channel::Sender;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Method, Request, Response, Server, StatusCode};
use tracing::warn;

/// Plain HTTP endpoints: `GET /api/state`, `GET /api/labels`, `POST /api/cmd`.
pub struct HttpThread {
    listen_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl HttpThread {
    pub fn spawn_with_addr(
        addr: &str,
        shared: SharedState,
        outbound_tx: Sender<OutboundMsg>,
    ) -> io::Result<Self> {
        let server = Server::http(addr).map_err(io::Error::other)?;
        let listen_addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| io::Error::other("http server is not bound to an ip address"))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_for_thread = Arc::clone(&shutdown);
        let join_handle =
            thread::spawn(move || serve(server, shared, outbound_tx, shutdown_for_thread));

        Ok(Self {
            listen_addr,
            shutdown,
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Ok(mut h) = self.join_handle.lock() {
            if let Some(h) = h.take() {
                let _ = h.join();
            }
        }
    }
}

impl Drop for HttpThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve(
    server: Server,
    shared: SharedState,
    outbound_tx: Sender<OutboundMsg>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let request = match server.recv_timeout(Duration::from_millis(50)) {
            Ok(Some(req)) => req,
            Ok(None) => continue,
            Err(e) => {
                warn!("http recv failed: {e}");
                continue;
            }
        };
        if let Err(e) = handle(request, &shared, &outbound_tx) {
            warn!("http respond failed: {e}");
        }
    }
}

fn handle(
    mut request: Request,
    shared: &SharedState,
    outbound_tx: &Sender<OutboundMsg>,
) -> io::Result<()> {
    if !lock(shared).http_available {
        return request.respond(text(503, "unavailable"));
    }

    let path = request.url().split('?').next().unwrap_or("").to_string();
    let method = request.method().clone();

    match (method, path.as_str()) {
        (Method::Get, "/api/state") => {
            let line = lock(shared).device.to_line();
            request.respond(text(200, &line))
        }
        (Method::Get, "/api/labels") => {
            let line = lock(shared).labels.to_line();
            request.respond(text(200, &line))
        }
        (Method::Post, "/api/cmd") => {
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body)?;

            let replies = handle_line(&mut lock(shared), &body);
            if replies.iter().any(|r| r == ERR_UNKNOWN_CMD) {
                return request.respond(text(400, ERR_UNKNOWN_CMD));
            }
            // Live clients see HTTP-originated changes too.
            for reply in replies.into_iter().filter(|r| r.starts_with(STATE_PREFIX)) {
                let _ = outbound_tx.try_send(OutboundMsg::Send { line: reply });
            }
            request.respond(text(200, "OK"))
        }
        _ => request.respond(text(404, "not found")),
    }
}

fn text(status: u16, body: &str) -> Response<io::Cursor<Vec<u8>>> {
    Response::from_string(body).with_status_code(StatusCode(status))
}
