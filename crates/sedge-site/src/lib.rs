//! Per-site record manager for the sedge registration store.
//!
//! One [`SiteManager`] runs in each site. The local site's manager serves
//! client operations (GET, PUT, PATCH, DELETE), drives the expiry timer
//! broker, and replicates committed changes best-effort to its sibling
//! sites; sibling managers hold no siblings of their own and simply apply
//! what they are sent, under their own store's compare-and-swap
//! discipline.
//!
//! Replication never changes a client-visible outcome, and the
//! create/update fallback at the sibling boundary is bounded: a rejected
//! create is retried once as an update, a rejected update once as a
//! create, and whatever happens then is final.

mod broker;
mod config;
mod expiry;
mod handlers;
mod site;
mod timers;

pub use broker::HttpTimerService;
pub use config::ConfigError;
pub use config::SiteConfig;
pub use expiry::ExpiryDispatcher;
pub use handlers::timer_pop_router;
pub use site::SiteManager;
pub use timers::TimerCoordinator;
