//! Core types for the sedge registration store.
//!
//! A registration record holds everything the registrar knows about one
//! subscriber: the contact bindings registered against the address of
//! record, the event subscriptions watching it, the associated identity
//! set, and the notification sequence number advertised to subscribers.
//! Records are value types; cloning one deep-copies its bindings and
//! subscriptions, and handing one across a boundary transfers ownership.
//!
//! This crate also defines the narrow service traits the rest of the
//! system is built on:
//!
//! - [`AorStore`] - the optimistic-concurrency backing store boundary
//! - [`RegistrarSite`] - the capability one site exposes to its siblings
//! - [`TimerService`] - the external one-shot timer broker
//! - [`TimerPopConsumer`] - the upstream consumer of expiry notifications

mod associated_uris;
mod binding;
mod error;
mod patch;
mod record;
mod subscription;
mod traits;

pub mod constants;
pub mod test_support;

pub use associated_uris::AssociatedUris;
pub use binding::Binding;
pub use error::AorStoreError;
pub use error::RegistrarError;
pub use error::RegistrarResult;
pub use error::TimerServiceError;
pub use patch::Patch;
pub use record::Record;
pub use subscription::Subscription;
pub use traits::AorStore;
pub use traits::RegistrarSite;
pub use traits::TimerPopConsumer;
pub use traits::TimerService;

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
