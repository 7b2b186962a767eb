//! The Basic authentication handler.

use trellis::{BoxFuture, Context, Handler, HandlerFunc};

use crate::credentials::{Account, CredentialStore};
use crate::error::{AuthError, Result};

/// Side-table key under which the authenticated user name is stored.
pub const AUTH_USER_KEY: &str = "user";

/// Value of the `WWW-Authenticate` header sent with a 401.
pub const CHALLENGE: &str = "Basic realm=\"Authorization Required\"";

/// Middleware that admits requests carrying valid Basic credentials.
///
/// On success the user name is stored as a `String` under
/// [`AUTH_USER_KEY`] and the chain continues. Otherwise the challenge header
/// is set and the chain fails with 401.
#[derive(Debug)]
pub struct BasicAuth {
    store: CredentialStore,
}

impl BasicAuth {
    /// Wraps an already built store.
    pub const fn new(store: CredentialStore) -> Self {
        Self { store }
    }

    /// Builds the store from `accounts`.
    ///
    /// # Errors
    ///
    /// See [`CredentialStore::build`].
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Result<Self> {
        CredentialStore::build(accounts).map(Self::new)
    }
}

impl Handler for BasicAuth {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let presented = c.request().get_header("Authorization").unwrap_or_default();
            match self.store.lookup(presented) {
                Some(user) => {
                    tracing::debug!(user, "basic auth accepted");
                    c.set(AUTH_USER_KEY, user.to_string());
                    c.next().await;
                }
                None => {
                    tracing::warn!(
                        path = %c.request().path,
                        requester = c.request().client_ip().unwrap_or("-"),
                        "basic auth rejected"
                    );
                    c.writer.set_header("WWW-Authenticate", CHALLENGE);
                    c.fail(401, AuthError::Unauthorized);
                }
            }
        })
    }
}

/// Builds a [`BasicAuth`] middleware ready to be added to a group.
///
/// ```
/// use trellis::Engine;
/// use trellis_auth::{basic_auth, Account};
///
/// let engine = Engine::new();
/// let mut admin = engine.group("/admin");
/// admin.middleware(basic_auth([Account::new("admin", "hunter2")]).unwrap());
/// ```
///
/// # Errors
///
/// See [`CredentialStore::build`].
pub fn basic_auth(accounts: impl IntoIterator<Item = Account>) -> Result<HandlerFunc> {
    Ok(BasicAuth::from_accounts(accounts)?.into())
}
