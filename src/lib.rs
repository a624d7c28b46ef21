//! Blocking-worker HTTP execution core for remote directory and collaboration
//! service clients.
//!
//! Callers describe a call with a [`request::Request`], hand it to an
//! [`executor::Executor`] and get back an [`future::ExecutionHandle`] that
//! resolves to a [`response::Response`] or an [`error::Error`]. Error statuses
//! (>= 400) resolve normally so their bodies can be inspected.
//!
//! ```no_run
//! use services_http::config::ExecutorConfig;
//! use services_http::executor::Executor;
//! use services_http::request::Request;
//!
//! let executor = Executor::new(&ExecutorConfig::default())?;
//! let handle = executor.submit(
//!     Request::get("https://contoso.sharepoint.com/_api/web/lists")
//!         .with_header("Accept", "application/json;odata=verbose"),
//! );
//! let mut response = handle.wait()?;
//! println!("{} {}", response.status(), response.read_to_end()?);
//! # Ok::<(), services_http::error::Error>(())
//! ```

#[macro_use] extern crate log;

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod future;
pub mod logger;
pub mod request;
pub mod response;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use executor::Executor;
pub use future::ExecutionHandle;
pub use request::{Request, Verb};
pub use response::Response;
