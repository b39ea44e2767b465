#![cfg_attr(not(test), forbid(unsafe_code))]

//! Headless Writescape client.
//!
//! The crate owns everything a Writescape front-end needs besides rendering:
//!
//! * [`session`]: the single global session store and its persisted login.
//! * [`lifecycle`]: request scopes, stale-result rejection, debouncing and form fields.
//! * [`features`]: one controller per page or widget (login, registration, posts,
//!   profiles, feed, search, session expiry).
//! * [`realtime`]: the Socket.IO chat channel.
//! * [`api`]: the typed backend client.
//!
//! [`Writescape`] wires them together from a [`shared::config::ClientConfig`].

pub mod api;
pub mod app;
pub mod error;
pub mod features;
pub mod lifecycle;
pub mod realtime;
pub mod session;
pub mod tracer;

pub use api::{HttpApi, WritescapeApi};
pub use app::Writescape;
pub use error::{ClientError, ClientResult, ErrorKind};
pub use features::{FeatureContext, Route};
pub use session::{SessionAction, SessionState, SessionStore};
