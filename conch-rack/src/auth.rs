//! Login guard for every backend call the view model makes.
//!
//! A guarded call either runs (`Access::Granted`) or asks the caller to send
//! the user to the login page (`Access::Redirect`). Unauthorized never travels
//! further as an error.

use crate::api::ConchApi;
use crate::error::{ConchError, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access<T> {
    Granted(T),
    Redirect,
}

impl<T> Access<T> {
    pub fn granted(self) -> Option<T> {
        match self {
            Access::Granted(value) => Some(value),
            Access::Redirect => None,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Access::Redirect)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Access<U> {
        match self {
            Access::Granted(value) => Access::Granted(f(value)),
            Access::Redirect => Access::Redirect,
        }
    }
}

pub struct AuthGate {
    api: Arc<dyn ConchApi>,
    logged_in: AtomicBool,
}

impl AuthGate {
    pub fn new(api: Arc<dyn ConchApi>) -> Self {
        Self { api, logged_in: AtomicBool::new(false) }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Relaxed)
    }

    /// Probes `/me` once per session, then runs `next`.
    pub async fn require_login<T, F, Fut>(&self, next: F) -> Result<Access<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.is_logged_in() {
            match self.api.me().await {
                Ok(()) => self.logged_in.store(true, Ordering::Relaxed),
                Err(ConchError::Unauthorized) => {
                    debug!("no session, redirecting to login");
                    return Ok(Access::Redirect);
                }
                Err(e) => return Err(e),
            }
        }

        match next().await {
            Ok(value) => Ok(Access::Granted(value)),
            Err(ConchError::Unauthorized) => {
                warn!("session rejected by backend, redirecting to login");
                self.logged_in.store(false, Ordering::Relaxed);
                Ok(Access::Redirect)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn login(&self, user: &str, password: &str) -> Result<bool> {
        let ok = self.api.login(user, password).await?;
        self.logged_in.store(ok, Ordering::Relaxed);
        if ok {
            info!(user, "logged in");
        } else {
            warn!(user, "login rejected");
        }
        Ok(ok)
    }

    pub async fn logout(&self) -> Result<()> {
        self.api.logout().await?;
        self.logged_in.store(false, Ordering::Relaxed);
        Ok(())
    }
}
