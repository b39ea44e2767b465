//! Global session: reducer, observable store and durable persistence.

pub mod persistence;
pub mod store;

pub use persistence::{FileSessionStorage, MemorySessionStorage, SESSION_KEY, SessionStorage};
pub use store::{SessionAction, SessionState, SessionStore, reduce};
