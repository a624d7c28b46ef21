//! The outbound side: opening one connection per request.
//!
//! `Transport::open` applies the verb and every header, writes the request
//! body when the verb carries one, and returns once the response head is in.
//! The returned `Connection` still owns the socket; the body is pulled lazily
//! through `error_stream` / `input_stream`.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};

use reqwest::blocking::{Body, Client};
use reqwest::header::HeaderMap;
use reqwest::Method;

use crate::config::ExecutorConfig;
use crate::error::Result;
use crate::request::{Request, RequestBody, Verb};


/// Multi-valued response headers, values in the order the server sent them.
pub type Headers = HashMap<String, Vec<String>>;

/// Response body as handed out by a connection.
pub type BodyStream = Box<dyn Read + Send>;


pub trait Connection: Send {
    fn status(&mut self) -> Result<u16>;

    fn headers(&self) -> Headers;

    /// Body of an error status, if the transport keeps it on a separate channel.
    fn error_stream(&mut self) -> Option<BodyStream>;

    /// Regular body. `None` once it has been handed out.
    fn input_stream(&mut self) -> Result<Option<BodyStream>>;

    /// Releases the socket. Must tolerate repeated calls.
    fn disconnect(&mut self);
}

pub trait Transport: Send + Sync {
    fn open(&self, request: &mut Request) -> Result<Box<dyn Connection>>;
}


/// `Transport` over a blocking reqwest client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(cfg: &ExecutorConfig) -> Result<HttpTransport> {
        let mut builder = Client::builder()
            .connect_timeout(cfg.connect_timeout())
            .timeout(cfg.read_timeout());
        if let Some(ua) = &cfg.user_agent {
            builder = builder.user_agent(ua.as_str());
        }
        Ok(HttpTransport { client: builder.build()? })
    }
}

fn method_for(verb: Verb) -> Method {
    match verb {
        Verb::Get => Method::GET,
        Verb::Post => Method::POST,
        Verb::Put => Method::PUT,
        Verb::Delete => Method::DELETE,
        Verb::Patch => Method::PATCH,
        Verb::Head => Method::HEAD,
        Verb::Options => Method::OPTIONS,
    }
}

impl Transport for HttpTransport {
    fn open(&self, request: &mut Request) -> Result<Box<dyn Connection>> {
        let mut builder = self.client.request(method_for(request.verb()), request.url());

        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.take_body() {
            // Unknown length, sent chunked.
            Some(RequestBody::Stream(stream)) => builder.body(Body::new(stream)),
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes),
            None => builder,
        };

        let response = builder.send()?;
        Ok(Box::new(HttpConnection {
            status: response.status().as_u16(),
            headers: collect_headers(response.headers()),
            response: Some(response),
        }))
    }
}


struct HttpConnection {
    status: u16,
    headers: Headers,
    response: Option<reqwest::blocking::Response>,
}

impl Connection for HttpConnection {
    fn status(&mut self) -> Result<u16> {
        Ok(self.status)
    }

    fn headers(&self) -> Headers {
        self.headers.clone()
    }

    fn error_stream(&mut self) -> Option<BodyStream> {
        // reqwest has a single body channel; for an error status it is the error body.
        if self.status >= 400 {
            return self.response.take().and_then(non_empty);
        }
        None
    }

    fn input_stream(&mut self) -> Result<Option<BodyStream>> {
        Ok(self.response.take().map(|r| Box::new(r) as BodyStream))
    }

    fn disconnect(&mut self) {
        self.response = None;
    }
}


/// `None` when `body` ends before its first byte or fails to produce one.
fn non_empty<R: Read + Send + 'static>(body: R) -> Option<BodyStream> {
    let mut reader = BufReader::new(body);
    match reader.fill_buf() {
        Ok(buf) if !buf.is_empty() => Some(Box::new(reader)),
        Ok(_) => None,
        Err(e) => {
            debug!("[TRANSPORT] Error body unreadable: {}", e);
            None
        }
    }
}

pub fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map.iter() {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    headers
}
