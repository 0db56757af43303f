use std::time::Duration;

// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "kvcache";

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "KVCACHE_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "KVCACHE_LOG";

/// Environment variable for cache server host
pub const ENV_HOST: &str = "KVCACHE_HOST";

/// Environment variable for cache server port
pub const ENV_PORT: &str = "KVCACHE_PORT";

/// Environment variable for connect/response timeout in seconds
pub const ENV_TIMEOUT: &str = "KVCACHE_TIMEOUT";

/// Environment variable to request a shared (persistent) connection
pub const ENV_PERSISTENT: &str = "KVCACHE_PERSISTENT";

// =============================================================================
// Server Defaults (CLI only; library callers must configure a server)
// =============================================================================

/// Default cache server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default cache server port
pub const DEFAULT_PORT: u16 = 6379;

/// Default connect/response timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: f64 = 1.0;

// =============================================================================
// Cache Semantics
// =============================================================================

/// Lifetime used when the caller does not pick one
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

/// Longest lifetime the store is documented to accept (30 days).
/// Not enforced here; the store clamps or rejects larger values.
pub const MAX_LIFETIME: Duration = Duration::from_secs(2_592_000);

/// Wait after a flush before returning. Some client/server combinations drop
/// writes issued immediately after FLUSHALL.
pub const FLUSH_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Default counter step for increment/decrement
pub const DEFAULT_STEP: i64 = 1;

/// TTL reply for a key that exists without an expiry
pub const TTL_NO_EXPIRY: i64 = -1;

/// TTL reply for a key that does not exist
pub const TTL_MISSING: i64 = -2;
