//! Fixed names and defaults used across the proxy.

/// Environment variable holding the first (highest priority) private provider URL.
pub const PRIVATE_RPC_URL_1_ENV: &str = "BASE_RPC_PRIVATE_URL_1";

/// Environment variable holding the second private provider URL.
pub const PRIVATE_RPC_URL_2_ENV: &str = "BASE_RPC_PRIVATE_URL_2";

/// Environment variable holding the public provider URL, tried last.
pub const PUBLIC_RPC_URL_ENV: &str = "BASE_RPC_PUBLIC_URL";

/// Default per-attempt timeout in milliseconds.
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 5000;

/// Default display names for the three provider slots, in priority order.
pub const DEFAULT_PRIVATE_1_NAME: &str = "Private RPC 1";
pub const DEFAULT_PRIVATE_2_NAME: &str = "Private RPC 2";
pub const DEFAULT_PUBLIC_NAME: &str = "Public RPC";
