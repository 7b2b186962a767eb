//! # trellis-auth
//!
//! HTTP Basic authentication (RFC 7617) for trellis route groups.
//!
//! Accounts are turned once, at startup, into an immutable
//! [`CredentialStore`]. The [`BasicAuth`] middleware looks up the
//! `Authorization` header in it; on success the user name is available to
//! later handlers under [`AUTH_USER_KEY`], otherwise the request is answered
//! with 401 and a `WWW-Authenticate` challenge.
//!
//! ## Quick Start
//!
//! ```
//! use trellis::{handler_fn, Engine};
//! use trellis_auth::{basic_auth, Account, AUTH_USER_KEY};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new();
//! let admin = engine.group_with(
//!     "/admin",
//!     [basic_auth([Account::new("alice", "pw1"), Account::new("bob", "pw2")])?],
//! );
//! admin.get("/whoami", [handler_fn(|c| Box::pin(async move {
//!     let user = c.get::<String>(AUTH_USER_KEY).clone();
//!     c.string(200, user);
//! }))])?;
//! # Ok(())
//! # }
//! ```
//!
//! An empty account list, or an account with an empty field, is rejected
//! when the middleware is built so a server never runs with an unusable
//! store.

mod basic;
mod credentials;
mod error;

pub use basic::{basic_auth, BasicAuth, AUTH_USER_KEY, CHALLENGE};
pub use credentials::{encode_token, Account, CredentialStore};
pub use error::{AuthError, Result};
