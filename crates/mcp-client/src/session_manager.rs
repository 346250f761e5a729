//! Session pool.
//!
//! A [`SessionManager`] multiplexes callers onto long-lived MCP sessions.
//! Callers are told apart by the headers they present: each distinct
//! header set (see [`session_key`](crate::session_key::session_key)) gets
//! its own session, created lazily on first use and recreated when a
//! liveness probe shows it has died.
//!
//! Lookups take the read lock only. Creation takes the write lock and
//! re-checks the map first, so concurrent callers with the same headers
//! never open duplicate sessions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::context::CallContext;
use crate::error::{CloseErrors, McpError};
use crate::session::{Client, ClientSession};
use crate::session_key::session_key;
use crate::transport::{bind_headers, Headers, Transport};

/// Probe bound applied when the caller's context has no deadline.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Report whether `session` still answers a ping.
///
/// `None` is never valid. A context without a deadline is bounded by
/// `ping_timeout` for the probe; an existing deadline is used unchanged.
/// Every probe failure counts as "not valid".
pub async fn is_session_valid(ctx: &CallContext, session: Option<&ClientSession>, ping_timeout: Duration) -> bool {
    let Some(session) = session else {
        return false;
    };

    let probe_ctx = match ctx.deadline() {
        Some(_) => ctx.clone(),
        None => ctx.with_timeout(ping_timeout),
    };

    match session.ping(&probe_ctx).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "MCP session failed liveness probe");
            false
        }
    }
}

/// One pooled session and the headers it was established with.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub session: Arc<ClientSession>,
    pub headers: Headers,
}

/// Pool of MCP sessions keyed by caller headers.
pub struct SessionManager {
    client: Client,
    transport: Arc<dyn Transport>,
    ping_timeout: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionManager {
    pub fn new(client: Client, transport: Arc<dyn Transport>) -> Self {
        Self {
            client,
            transport,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Override the liveness probe bound (default [`DEFAULT_PING_TIMEOUT`]).
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Whether sessions are told apart by caller headers.
    pub fn is_header_sensitive(&self) -> bool {
        self.transport.header_injection().is_some()
    }

    /// The pool key `headers` map to on this manager's transport.
    pub fn session_key(&self, headers: &Headers) -> String {
        session_key(headers, self.is_header_sensitive())
    }

    /// Return a live session for `headers`, creating or replacing it if
    /// needed.
    ///
    /// Waiting for the pool lock counts against `ctx`: if it is cancelled or
    /// its deadline passes first, `Cancelled` or `DeadlineExceeded` is
    /// returned and the pool is left untouched. Failures once creation has
    /// started are wrapped in [`McpError::SessionCreate`].
    pub async fn get_session(&self, ctx: &CallContext, headers: &Headers) -> Result<Arc<ClientSession>, McpError> {
        let key = self.session_key(headers);

        // Fast path: probe outside the lock so readers never wait on I/O.
        let seen = ctx
            .run(async {
                let sessions = self.sessions.read().await;
                Ok::<_, McpError>(sessions.get(&key).map(|entry| Arc::clone(&entry.session)))
            })
            .await?;
        if let Some(session) = &seen {
            if is_session_valid(ctx, Some(session.as_ref()), self.ping_timeout).await {
                tracing::trace!(session_key = %key, "reusing pooled MCP session");
                return Ok(Arc::clone(session));
            }
        }

        // Slow path: re-check under the write lock, another caller may
        // have replaced the entry while we waited.
        let mut sessions = ctx.run(async { Ok::<_, McpError>(self.sessions.write().await) }).await?;
        if let Some(entry) = sessions.get(&key) {
            let already_probed = seen.as_ref().is_some_and(|dead| Arc::ptr_eq(dead, &entry.session));
            if !already_probed && is_session_valid(ctx, Some(entry.session.as_ref()), self.ping_timeout).await {
                return Ok(Arc::clone(&entry.session));
            }
        }

        let transport = bind_headers(&self.transport, headers);
        let session = self
            .client
            .connect(ctx, transport.as_ref())
            .await
            .map_err(|e| {
                tracing::warn!(session_key = %key, error = %e, "failed to create MCP session");
                McpError::SessionCreate(Box::new(e))
            })?;

        let stale = sessions.insert(
            key.clone(),
            SessionEntry {
                session: Arc::clone(&session),
                headers: headers.clone(),
            },
        );
        let pooled = sessions.len();
        drop(sessions);

        match stale {
            Some(stale) => {
                tracing::info!(session_key = %key, "replaced dead MCP session");
                if let Err(e) = stale.session.close().await {
                    tracing::debug!(session_key = %key, error = %e, "error closing dead MCP session");
                }
            }
            None => tracing::info!(session_key = %key, pooled, "created MCP session"),
        }

        Ok(session)
    }

    /// Close every pooled session and empty the pool.
    ///
    /// Every session is closed even if some fail; the failures are returned
    /// together. The pool stays usable afterwards.
    pub async fn close(&self) -> Result<(), McpError> {
        let mut sessions = self.sessions.write().await;
        let entries: Vec<(String, SessionEntry)> = sessions.drain().collect();

        let mut errors = Vec::new();
        for (key, entry) in entries {
            if let Err(e) = entry.session.close().await {
                tracing::warn!(session_key = %key, error = %e, "error closing MCP session");
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(McpError::CloseSessions(CloseErrors(errors)))
        }
    }

    /// Number of pooled sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Snapshot of the entry stored under `key`, if any.
    pub async fn entry(&self, key: &str) -> Option<SessionEntry> {
        self.sessions.read().await.get(key).cloned()
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("client", self.client.info())
            .field("transport", &self.transport)
            .field("ping_timeout", &self.ping_timeout)
            .finish_non_exhaustive()
    }
}
