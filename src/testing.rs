//! In-memory transport doubles for driving the executor deterministically.

use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::request::{Request, RequestBody};
use crate::transport::{BodyStream, Connection, Headers, Transport};


/// Counts side effects seen by the doubles.
#[derive(Default)]
pub struct Tally {
    opened: AtomicUsize,
    disconnects: AtomicUsize,
    streams_closed: AtomicUsize,
    bytes_written: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl Tally {
    pub fn new() -> Arc<Tally> {
        Arc::new(Tally::default())
    }

    pub fn opened(&self) -> usize { self.opened.load(Ordering::SeqCst) }
    pub fn disconnects(&self) -> usize { self.disconnects.load(Ordering::SeqCst) }
    pub fn streams_closed(&self) -> usize { self.streams_closed.load(Ordering::SeqCst) }
    pub fn bytes_written(&self) -> usize { self.bytes_written.load(Ordering::SeqCst) }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}


/// A latch that blocks `wait` callers until `open` is called.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Gate> {
        Arc::new(Gate::default())
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    pub fn wait(&self) {
        let guard = self.open.lock().unwrap();
        let (_guard, timeout) = self.cv
            .wait_timeout_while(guard, Duration::from_secs(10), |open| !*open)
            .unwrap();
        assert!(!timeout.timed_out(), "gate was never opened");
    }
}


/// Signals `reading` on its first read, then blocks on `resume`.
#[derive(Clone)]
pub struct Stall {
    pub reading: Arc<Gate>,
    pub resume: Arc<Gate>,
}

impl Stall {
    pub fn new() -> Stall {
        Stall { reading: Gate::new(), resume: Gate::new() }
    }
}

pub struct TrackedStream {
    inner: Cursor<Vec<u8>>,
    tally: Arc<Tally>,
    stall: Option<Stall>,
}

impl TrackedStream {
    pub fn new(body: Vec<u8>, tally: Arc<Tally>) -> TrackedStream {
        TrackedStream { inner: Cursor::new(body), tally, stall: None }
    }

    fn stalled(body: Vec<u8>, tally: Arc<Tally>, stall: Option<Stall>) -> TrackedStream {
        TrackedStream { inner: Cursor::new(body), tally, stall }
    }
}

impl Read for TrackedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(stall) = self.stall.take() {
            stall.reading.open();
            stall.resume.wait();
        }
        self.inner.read(buf)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.tally.streams_closed.fetch_add(1, Ordering::SeqCst);
    }
}


/// What a scripted connection answers.
#[derive(Clone, Default)]
pub struct Script {
    pub status: u16,
    pub headers: Headers,
    pub error_body: Option<Vec<u8>>,
    pub input_body: Option<Vec<u8>>,
    pub fail_open: bool,
    pub fail_status: bool,
    /// Applied to the input body.
    pub stall: Option<Stall>,
}

impl Script {
    pub fn ok(body: &str) -> Script {
        Script { status: 200, input_body: Some(body.as_bytes().to_vec()), ..Script::default() }
    }

    pub fn status(status: u16) -> Script {
        Script { status, ..Script::default() }
    }
}


pub struct ScriptedConnection {
    script: Script,
    tally: Arc<Tally>,
}

impl ScriptedConnection {
    pub fn empty(tally: Arc<Tally>) -> ScriptedConnection {
        ScriptedConnection { script: Script::status(200), tally }
    }
}

impl Connection for ScriptedConnection {
    fn status(&mut self) -> Result<u16> {
        if self.script.fail_status {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset while reading status").into());
        }
        Ok(self.script.status)
    }

    fn headers(&self) -> Headers {
        self.script.headers.clone()
    }

    fn error_stream(&mut self) -> Option<BodyStream> {
        let tally = self.tally.clone();
        self.script.error_body.take().map(|b| Box::new(TrackedStream::new(b, tally)) as BodyStream)
    }

    fn input_stream(&mut self) -> Result<Option<BodyStream>> {
        let tally = self.tally.clone();
        let stall = self.script.stall.take();
        Ok(self.script.input_body.take().map(|b| Box::new(TrackedStream::stalled(b, tally, stall)) as BodyStream))
    }

    fn disconnect(&mut self) {
        self.tally.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}


/// Transport that answers every request with the same script.
///
/// With gates installed, `open` signals `entered` and then blocks on
/// `release` before touching the request body.
pub struct ScriptedTransport {
    script: Script,
    tally: Arc<Tally>,
    entered: Option<Arc<Gate>>,
    release: Option<Arc<Gate>>,
}

impl ScriptedTransport {
    pub fn new(script: Script, tally: Arc<Tally>) -> ScriptedTransport {
        ScriptedTransport { script, tally, entered: None, release: None }
    }

    pub fn gated(script: Script, tally: Arc<Tally>, entered: Arc<Gate>, release: Arc<Gate>) -> ScriptedTransport {
        ScriptedTransport { script, tally, entered: Some(entered), release: Some(release) }
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, request: &mut Request) -> Result<Box<dyn Connection>> {
        self.tally.opened.fetch_add(1, Ordering::SeqCst);
        self.tally.urls.lock().unwrap().push(request.url().to_string());
        if let Some(g) = &self.entered {
            g.open();
        }
        if let Some(g) = &self.release {
            g.wait();
        }

        let written = match request.take_body() {
            Some(RequestBody::Bytes(b)) => b.len() as u64,
            Some(RequestBody::Stream(mut s)) => io::copy(&mut s, &mut io::sink())?,
            None => 0,
        };
        self.tally.bytes_written.fetch_add(written as usize, Ordering::SeqCst);

        if self.script.fail_open {
            return Err(Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused")));
        }
        Ok(Box::new(ScriptedConnection { script: self.script.clone(), tally: self.tally.clone() }))
    }
}
