//! Completed call: status, headers and a body that still streams from the
//! connection.
//!
//! The connection and its stream live in `Resources`, a single slot behind the
//! per-request close lock. The executor owns the slot until it hands a
//! `Response` out; from then on the response releases it on `close()` or drop.
//! Every release goes through the lock and takes the resources out, so the
//! socket is closed at most once no matter how many paths try.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::transport::{BodyStream, Connection, Headers};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Owner {
    Executor,
    Response,
}

/// Network side effects of one request.
pub struct Resources {
    connection: Option<Box<dyn Connection>>,
    stream: Option<BodyStream>,
    owner: Owner,
    released: bool,
}

/// Lock scoped to the open, read and close of one request.
pub type CloseLock = Arc<Mutex<Resources>>;

impl Resources {
    pub fn new() -> Resources {
        Resources { connection: None, stream: None, owner: Owner::Executor, released: false }
    }

    pub fn shared() -> CloseLock {
        Arc::new(Mutex::new(Resources::new()))
    }

    pub fn attach_connection(&mut self, connection: Box<dyn Connection>) -> &mut Box<dyn Connection> {
        self.connection.insert(connection)
    }

    pub fn attach_stream(&mut self, stream: BodyStream) {
        self.stream = Some(stream);
    }

    pub(crate) fn owner(&self) -> Owner {
        self.owner
    }

    pub(crate) fn hand_over(&mut self) {
        self.owner = Owner::Response;
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Closes the stream and disconnects. Returns `false` if there was nothing
    /// left to release.
    pub fn release(&mut self) -> bool {
        let stream = self.stream.take();
        let connection = self.connection.take();
        let had_any = stream.is_some() || connection.is_some();

        drop(stream);
        if let Some(mut c) = connection {
            c.disconnect();
        }
        self.released = true;
        had_any
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn lock(resources: &CloseLock) -> MutexGuard<'_, Resources> {
    resources.lock().unwrap_or_else(PoisonError::into_inner)
}


/// Raw body reader. Reads after release return end-of-stream.
pub struct Body {
    resources: CloseLock,
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match lock(&self.resources).stream.as_mut() {
            Some(stream) => stream.read(buf),
            None => Ok(0),
        }
    }
}

pub type BodyReader = BufReader<Body>;


/// Result of a completed call, including error statuses.
///
/// The read helpers share one cursor: `read_all_bytes`, `read_to_end`,
/// `read_line` and `input_stream` all advance the same position. Pick one mode
/// per response; mixing them after the first read is unsupported and simply
/// continues from wherever the previous mode stopped.
pub struct Response {
    status: u16,
    headers: Headers,
    reader: BodyReader,
    resources: CloseLock,
}

impl Response {
    pub(crate) fn new(status: u16, headers: Headers, resources: CloseLock) -> Response {
        Response {
            status,
            headers,
            reader: BufReader::new(Body { resources: resources.clone() }),
            resources,
        }
    }

    /// A response over an arbitrary stream, with no connection behind it.
    pub fn from_parts(status: u16, headers: Headers, stream: BodyStream) -> Response {
        let resources = Resources::shared();
        {
            let mut res = lock(&resources);
            res.attach_stream(stream);
            res.hand_over();
        }
        Response::new(status, headers, resources)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_error_status(&self) -> bool {
        self.status >= 400
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Values of header `name`, matched case-insensitively. Empty if absent.
    pub fn header(&self, name: &str) -> &[String] {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn read_all_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Drains the body and decodes it as UTF-8, replacing invalid sequences.
    pub fn read_to_end(&mut self) -> Result<String> {
        let bytes = self.read_all_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Next line without its terminator, `None` at end of stream.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// The buffered body reader itself, for callers that want manual control.
    pub fn input_stream(&mut self) -> &mut BodyReader {
        &mut self.reader
    }

    /// Releases the stream and connection. Safe to call more than once.
    pub fn close(&mut self) {
        let mut res = lock(&self.resources);
        if res.owner() == Owner::Response {
            res.release();
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.resources).is_released()
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish()
    }
}
