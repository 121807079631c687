//! Fixed limits and well-known names shared across the workspace.

/// Slack added to a record's last expiry when deriving the stored TTL, so
/// a record outlives its final binding long enough for deregistration
/// processing to observe it.
pub const DEFAULT_RECORD_GRACE_SECONDS: i64 = 30;

/// Minimum relative expiry handed to the timer broker. A write can leave a
/// record whose earliest expiry is already in the past; the broker still
/// needs a positive duration.
pub const MIN_TIMER_EXPIRY_SECONDS: i64 = 1;

/// Default number of compare-and-swap attempts before a write loop gives up.
pub const DEFAULT_MAX_CAS_RETRIES: u32 = 100;

/// Default base delay between contended write attempts, in milliseconds.
pub const DEFAULT_CAS_RETRY_DELAY_MS: u64 = 1;

/// Timer broker tag counting registrations on a record.
pub const TAG_REG: &str = "REG";

/// Timer broker tag counting contact bindings on a record.
pub const TAG_BIND: &str = "BIND";

/// Timer broker tag counting event subscriptions on a record.
pub const TAG_SUB: &str = "SUB";
