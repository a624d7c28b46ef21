use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

use reqwest::header::{HeaderName, HeaderValue};

use crate::error::{Error, Result};


/// HTTP method of a `Request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
            Verb::Patch => "PATCH",
            Verb::Head => "HEAD",
            Verb::Options => "OPTIONS",
        }
    }

    /// Whether a request body is transmitted for this verb.
    pub fn allows_body(&self) -> bool {
        matches!(self, Verb::Post | Verb::Put | Verb::Patch)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Verb> {
        let verb = match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Verb::Get,
            "POST" => Verb::Post,
            "PUT" => Verb::Put,
            "DELETE" => Verb::Delete,
            "PATCH" => Verb::Patch,
            "HEAD" => Verb::Head,
            "OPTIONS" => Verb::Options,
            "" => return Err(Error::InvalidArgument("verb is empty".to_string())),
            other => return Err(Error::InvalidArgument(format!("unsupported verb `{}`", other))),
        };
        Ok(verb)
    }
}


/// Streaming request body source.
pub type ContentStream = Box<dyn Read + Send>;

/// Description of one outbound HTTP call.
///
/// Built by callers and moved into `Executor::submit`. Validation of the URL
/// happens at submission, so a bad request shows up as a failed handle.
pub struct Request {
    url: String,
    verb: Verb,
    headers: HashMap<String, String>,
    content: Option<Vec<u8>>,
    content_stream: Option<ContentStream>,
}

impl Request {
    pub fn new(verb: Verb, url: impl Into<String>) -> Request {
        Request {
            url: url.into(),
            verb,
            headers: HashMap::new(),
            content: None,
            content_stream: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Request {
        Request::new(Verb::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Request {
        Request::new(Verb::Post, url)
    }

    /// Sets a header, replacing any earlier value under the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Request {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Request {
        self.content = Some(content.into());
        self
    }

    /// Attaches a streaming body. It wins over `with_content` when both are set.
    pub fn with_content_stream(mut self, stream: impl Read + Send + 'static) -> Request {
        self.content_stream = Some(Box::new(stream));
        self
    }

    pub fn url(&self) -> &str { &self.url }
    pub fn verb(&self) -> Verb { self.verb }
    pub fn headers(&self) -> &HashMap<String, String> { &self.headers }
    pub fn content(&self) -> Option<&[u8]> { self.content.as_deref() }

    /// Hands the body to the transport, or `None` if the verb carries none.
    /// Both body forms are consumed; only one of them is returned.
    pub fn take_body(&mut self) -> Option<RequestBody> {
        if !self.verb.allows_body() {
            return None;
        }
        let content = self.content.take();
        match self.content_stream.take() {
            Some(stream) => Some(RequestBody::Stream(stream)),
            None => content.map(RequestBody::Bytes),
        }
    }

    /// Checks the request is usable: non-empty absolute URL with a host, and
    /// headers that can go on the wire as they are.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::InvalidArgument("url is empty".to_string()));
        }
        let parsed = reqwest::Url::parse(&self.url)
            .map_err(|e| Error::InvalidArgument(format!("url `{}`: {}", self.url, e)))?;
        if !parsed.has_host() {
            return Err(Error::InvalidArgument(format!("url `{}` has no host", self.url)));
        }
        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidArgument(format!("header name `{}`: {}", name, e)))?;
            HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidArgument(format!("value of header `{}`: {}", name, e)))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("verb", &self.verb)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("content_len", &self.content.as_ref().map(Vec::len))
            .field("content_stream", &self.content_stream.is_some())
            .finish()
    }
}


/// Exactly one body form, chosen by `Request::take_body`.
pub enum RequestBody {
    Bytes(Vec<u8>),
    Stream(ContentStream),
}
