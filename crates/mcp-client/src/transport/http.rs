//! Outgoing HTTP exchanges for the header-sensitive transports.
//!
//! [`HttpClient`] separates the request-sending mechanism ([`Exchange`])
//! from the client settings (redirects, cookies, timeout) so the mechanism
//! can be decorated per caller while the settings are carried over as-is.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderName, HeaderValue};

use super::{Headers, TransportError};

/// Sends one HTTP request and returns its response.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, TransportError>;
}

/// How many redirects the underlying client follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// reqwest's default (up to 10 hops).
    #[default]
    Default,
    Limited(usize),
    None,
}

impl RedirectPolicy {
    fn to_reqwest(self) -> reqwest::redirect::Policy {
        match self {
            RedirectPolicy::Default => reqwest::redirect::Policy::default(),
            RedirectPolicy::Limited(max) => reqwest::redirect::Policy::limited(max),
            RedirectPolicy::None => reqwest::redirect::Policy::none(),
        }
    }
}

impl From<Option<usize>> for RedirectPolicy {
    fn from(max: Option<usize>) -> Self {
        match max {
            None => RedirectPolicy::Default,
            Some(0) => RedirectPolicy::None,
            Some(n) => RedirectPolicy::Limited(n),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HttpClient
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Client settings plus a replaceable request-sending mechanism.
///
/// When `exchange` is `None`, requests go through a `reqwest::Client`
/// built from `redirect` and `cookie_jar`.
#[derive(Clone, Default)]
pub struct HttpClient {
    pub exchange: Option<Arc<dyn Exchange>>,
    pub redirect: RedirectPolicy,
    pub cookie_jar: Option<Arc<Jar>>,
    /// Applied to every request that does not set its own timeout.
    pub timeout: Option<Duration>,
}

impl HttpClient {
    /// A copy of this client whose exchanges carry `headers`.
    ///
    /// Redirect policy, cookie jar and timeout are preserved verbatim.
    pub fn with_headers(&self, headers: &Headers) -> HttpClient {
        let exchange: Arc<dyn Exchange> = Arc::new(HeaderExchange::new(self.base_exchange(), headers.clone()));
        HttpClient {
            exchange: Some(exchange),
            redirect: self.redirect,
            cookie_jar: self.cookie_jar.clone(),
            timeout: self.timeout,
        }
    }

    /// Resolve the mechanism requests are sent through.
    fn base_exchange(&self) -> Arc<dyn Exchange> {
        match &self.exchange {
            Some(exchange) => Arc::clone(exchange),
            None => Arc::new(ReqwestExchange::with_settings(self.redirect, self.cookie_jar.clone())),
        }
    }

    /// Resolve once per connection; the result is reused for every message.
    pub(crate) fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            exchange: self.base_exchange(),
            timeout: self.timeout,
        }
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("custom_exchange", &self.exchange.is_some())
            .field("redirect", &self.redirect)
            .field("cookie_jar", &self.cookie_jar.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A resolved [`HttpClient`], held by an open connection.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    exchange: Arc<dyn Exchange>,
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub(crate) async fn execute(&self, mut request: reqwest::Request) -> Result<reqwest::Response, TransportError> {
        if let Some(timeout) = self.timeout {
            request.timeout_mut().get_or_insert(timeout);
        }
        self.exchange.execute(request).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Exchanges
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The default mechanism: a `reqwest::Client`, built on first use.
pub struct ReqwestExchange {
    redirect: RedirectPolicy,
    cookie_jar: Option<Arc<Jar>>,
    client: OnceLock<reqwest::Client>,
}

impl ReqwestExchange {
    /// Wrap an already configured client.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            redirect: RedirectPolicy::Default,
            cookie_jar: None,
            client: OnceLock::from(client),
        }
    }

    pub fn with_settings(redirect: RedirectPolicy, cookie_jar: Option<Arc<Jar>>) -> Self {
        Self {
            redirect,
            cookie_jar,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::Client, TransportError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let mut builder = reqwest::Client::builder().redirect(self.redirect.to_reqwest());
        if let Some(jar) = &self.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }
        let built = builder.build()?;
        Ok(self.client.get_or_init(|| built))
    }
}

#[async_trait]
impl Exchange for ReqwestExchange {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, TransportError> {
        Ok(self.client()?.execute(request).await?)
    }
}

/// Decorator that sets a fixed header set on every outgoing request.
///
/// Configured headers overwrite any value the request already carries for
/// the same name. An empty header set forwards requests untouched.
pub struct HeaderExchange {
    base: Arc<dyn Exchange>,
    headers: Headers,
}

impl HeaderExchange {
    pub fn new(base: Arc<dyn Exchange>, headers: Headers) -> Self {
        Self { base, headers }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

#[async_trait]
impl Exchange for HeaderExchange {
    async fn execute(&self, mut request: reqwest::Request) -> Result<reqwest::Response, TransportError> {
        if self.headers.is_empty() {
            return self.base.execute(request).await;
        }

        // The request is owned here, so it is edited in place; on an early
        // return its body is dropped with it.
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader(format!("value for {name}")))?;
            request.headers_mut().insert(header_name, header_value);
        }

        self.base.execute(request).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
