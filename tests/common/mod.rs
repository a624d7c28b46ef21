//! Local HTTP server used by the integration tests.
//!
//! Routes:
//! - `GET  /entity`         200, JSON body, two `Set-Cookie` headers
//! - `POST /echo`           200, JSON describing what the server received
//! - `GET  /status/{code}`  that status, body `status {code}`
//! - `GET  /empty/{code}`   that status, no body
//! - `GET  /lines`          three lines with mixed terminators
//! - `POST /slow`           reads the body slowly, replies with the byte count

#![allow(dead_code)]

use std::io::Read;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use services_http::config::ExecutorConfig;
use services_http::Executor;
use tiny_http::{Header, Method, Response, Server};


pub struct LocalServer {
    pub base_url: String,
    server: Arc<Server>,
    slow_started: Mutex<Receiver<()>>,
}

impl LocalServer {
    pub fn start() -> LocalServer {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind local server"));
        let addr = server.server_addr().to_ip().expect("tcp listener");
        let (tx, rx) = channel();

        let accept = server.clone();
        thread::spawn(move || {
            for rq in accept.incoming_requests() {
                let tx = tx.clone();
                thread::spawn(move || handle(rq, tx));
            }
        });

        LocalServer {
            base_url: format!("http://{}", addr),
            server,
            slow_started: Mutex::new(rx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Blocks until `/slow` has received its first body chunk.
    pub fn wait_slow_started(&self) {
        self.slow_started
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(10))
            .expect("slow upload never started");
    }
}

impl Drop for LocalServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}


pub fn executor() -> Executor {
    let cfg = ExecutorConfig { workers: 4, connect_timeout_ms: 2_000, read_timeout_ms: 30_000, ..ExecutorConfig::default() };
    Executor::new(&cfg).expect("build executor")
}


fn header(name: &str, value: &str) -> Header {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("valid header")
}

fn header_value(rq: &tiny_http::Request, name: &str) -> Option<String> {
    rq.headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str().to_string())
}

// `Response::from_string` always adds a text/plain Content-Type, so routes
// that set their own use `from_data`.
fn handle(mut rq: tiny_http::Request, slow_started: Sender<()>) {
    let url = rq.url().to_string();
    let method = rq.method().clone();

    let response = match (method, url.as_str()) {
        (Method::Get, "/entity") => Response::from_data(&b"{\"id\":\"1\"}"[..])
            .with_header(header("Content-Type", "application/json"))
            .with_header(header("Set-Cookie", "rtFa=1"))
            .with_header(header("Set-Cookie", "FedAuth=2")),

        (method, "/echo") => {
            let mut body = Vec::new();
            rq.as_reader().read_to_end(&mut body).ok();
            let echo = serde_json::json!({
                "verb": method.to_string(),
                "bytes": body.len(),
                "trace": header_value(&rq, "X-Trace"),
                "content_type": header_value(&rq, "Content-Type"),
            });
            Response::from_data(echo.to_string().into_bytes()).with_header(header("Content-Type", "application/json"))
        }

        (Method::Get, "/lines") => Response::from_string("first\r\nsecond\nthird"),

        (Method::Post, "/slow") => {
            let mut total = 0usize;
            let mut buf = vec![0u8; 64 * 1024];
            let mut signalled = false;
            loop {
                match rq.as_reader().read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => total += n,
                }
                if !signalled {
                    slow_started.send(()).ok();
                    signalled = true;
                }
                thread::sleep(Duration::from_micros(200));
            }
            Response::from_string(total.to_string())
        }

        (Method::Get, path) if path.starts_with("/status/") => {
            let code: u16 = path["/status/".len()..].parse().unwrap_or(500);
            Response::from_string(format!("status {}", code)).with_status_code(code)
        }

        (Method::Get, path) if path.starts_with("/empty/") => {
            let code: u16 = path["/empty/".len()..].parse().unwrap_or(500);
            Response::from_data(Vec::new()).with_status_code(code)
        }

        _ => Response::from_string("no route").with_status_code(404),
    };

    rq.respond(response).ok();
}
