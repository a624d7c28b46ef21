//! Runs requests on a worker pool and resolves their handles.
//!
//! Each submitted request becomes a `NetworkTask` on its own pool thread. The
//! task blocks on connect, write and read; the caller only sees the returned
//! `ExecutionHandle`.
//!
//! The per-request close lock (`Resources`) is held while the task checks for
//! cancellation, opens the connection and picks the body stream. The same lock
//! guards the final release, so at most one close ever reaches the socket.
//! Cancellation is cooperative: an in-flight read is not interrupted, but its
//! outcome is discarded and the resources are still released.

use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use threadpool::ThreadPool;

use crate::config::ExecutorConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::future::{self, ExecutionHandle, Promise};
use crate::request::Request;
use crate::response::{lock, CloseLock, Owner, Resources, Response};
use crate::transport::{BodyStream, HttpTransport, Transport};


const MODULE: &str = "EXECUTOR";
const WORKER_NAME: &str = "services-http-worker";

/// First status treated as an application error.
const ERROR_STATUS: u16 = 400;


pub struct Executor {
    pool: ThreadPool,
    transport: Arc<dyn Transport>,
}

impl Executor {
    /// Executor over `HttpTransport`, sized and timed by `cfg`.
    pub fn new(cfg: &ExecutorConfig) -> Result<Executor> {
        let transport = HttpTransport::new(cfg)?;
        Ok(Executor::with_transport(cfg.worker_count(), Arc::new(transport)))
    }

    pub fn with_transport(workers: usize, transport: Arc<dyn Transport>) -> Executor {
        let pool = threadpool::Builder::new()
            .num_threads(workers.max(1))
            .thread_name(WORKER_NAME.to_string())
            .build();
        Executor { pool, transport }
    }

    /// Schedules `request` and returns its handle. Never fails synchronously:
    /// an invalid request yields a handle already failed with `InvalidArgument`.
    pub fn submit(&self, request: Request) -> ExecutionHandle<Response> {
        let ctx = Context::new();

        if let Err(e) = request.validate() {
            warn!("[{}] Rejected request [qid={}]: {}", MODULE, ctx.qid, e);
            return ExecutionHandle::failed(e);
        }

        let headers = request.headers().keys().cloned().collect::<Vec<String>>().join(", ");
        info!("[{}] New Request [qid={}]: verb: {}; url: {}; headers: '{}'", MODULE, ctx.qid, request.verb(), request.url(), headers);

        let (promise, handle) = future::channel();
        let task = NetworkTask {
            request,
            promise,
            transport: self.transport.clone(),
            resources: Resources::shared(),
            ctx,
        };
        self.pool.execute(move || task.run());
        handle
    }

    /// Blocks until every submitted request has finished, cleanup included.
    pub fn join(&self) {
        self.pool.join();
    }
}


struct NetworkTask {
    request: Request,
    promise: Promise<Response>,
    transport: Arc<dyn Transport>,
    resources: CloseLock,
    ctx: Context,
}

impl NetworkTask {
    fn run(mut self) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute()))
            .unwrap_or_else(|_| Err(Error::WorkerLost));
        self.ctx.fix();
        let mut handed_over = false;

        match outcome {
            Ok(Some(response)) => {
                let status = response.status();
                match self.promise.set(response) {
                    Ok(()) => {
                        handed_over = true;
                        info!("[{}] Completed [qid={}]: time: {}ms; status: {}", MODULE, self.ctx.qid, self.ctx.time_ms(), status);
                    }
                    Err(mut unclaimed) => {
                        info!("[{}] Cancelled [qid={}] before hand-off; status {} discarded", MODULE, self.ctx.qid, status);
                        unclaimed.close();
                    }
                }
            }
            Ok(None) => {
                info!("[{}] Cancelled [qid={}]: time: {}ms; outcome discarded", MODULE, self.ctx.qid, self.ctx.time_ms());
            }
            Err(e) => {
                if self.promise.is_cancelled() {
                    debug!("[{}] Fault after cancellation [qid={}] swallowed: {}", MODULE, self.ctx.qid, e);
                } else {
                    lock(&self.resources).release();
                    error!("[{}] Failed [qid={}]: time: {}ms; {}", MODULE, self.ctx.qid, self.ctx.time_ms(), e);
                    self.promise.set_error(e);
                }
            }
        }

        // The caller may be blocked in a body read under the close lock.
        if !handed_over {
            self.close_stream_and_connection();
        }
    }

    /// Opens the connection and builds the response. `Ok(None)` means the
    /// handle was cancelled and nothing may be resolved.
    fn execute(&mut self) -> Result<Option<Response>> {
        let mut res = lock(&self.resources);

        if self.promise.is_cancelled() {
            return Ok(None);
        }

        let connection = res.attach_connection(self.transport.open(&mut self.request)?);
        if self.promise.is_cancelled() {
            return Ok(None);
        }

        let status = connection.status()?;
        let headers = connection.headers();

        let stream = if status >= ERROR_STATUS {
            match connection.error_stream() {
                Some(stream) => stream,
                None => match connection.input_stream() {
                    Ok(Some(stream)) => stream,
                    Ok(None) => diagnostic_body(status),
                    Err(e) => {
                        debug!("[{}] No input stream for status {} [qid={}]: {}", MODULE, status, self.ctx.qid, e);
                        diagnostic_body(status)
                    }
                },
            }
        } else {
            connection.input_stream()?.unwrap_or_else(|| Box::new(std::io::empty()) as BodyStream)
        };
        res.attach_stream(stream);

        if self.promise.is_cancelled() {
            return Ok(None);
        }

        res.hand_over();
        drop(res);
        Ok(Some(Response::new(status, headers, self.resources.clone())))
    }

    /// Runs once per execution that was not handed over. Releases whatever the
    /// executor still owns.
    fn close_stream_and_connection(&self) {
        let mut res = lock(&self.resources);
        if res.owner() == Owner::Executor && res.release() {
            debug!("[{}] Released stream and connection [qid={}]", MODULE, self.ctx.qid);
        }
    }
}


fn diagnostic_body(status: u16) -> BodyStream {
    Box::new(Cursor::new(format!("HTTP error{}", status).into_bytes()))
}
