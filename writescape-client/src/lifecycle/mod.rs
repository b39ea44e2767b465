//! Request-lifecycle primitives shared by every feature controller.
//!
//! * [`EpochCounter`]: monotonic trigger counter; one increment, one network call.
//! * [`RequestScope`] / [`RequestSlot`] / [`RequestTicket`]: cancellation tied to the
//!   owner's lifetime, with stale resolutions rejected before they touch state.
//! * [`Debouncer`]: `Idle → Scheduled → Fired` timer whose pending run is replaced by
//!   every new input.
//! * [`DraftField`] and [`SubmissionPhase`]: the per-field and per-form bookkeeping
//!   every form reducer shares.

pub mod debounce;
pub mod epoch;
pub mod form;
pub mod request;

pub use debounce::{DebouncePhase, Debouncer};
pub use epoch::{Epoch, EpochCounter};
pub use form::{DraftField, SubmissionPhase};
pub use request::{Outcome, RequestScope, RequestSlot, RequestTicket};
