//! OAuth defaults
//!
//! Endpoint URLs and the client ID come from configuration; these are the
//! values used when the configuration leaves a field out.

/// Redirect URI for native/out-of-band clients (code shown to the user).
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Refresh the access token when it expires within this many seconds.
pub const DEFAULT_EXPIRY_MARGIN_SECS: u64 = 60;

/// Upper bound on a single token refresh exchange.
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 30;

/// Environment variable holding the OAuth client secret.
pub const CLIENT_SECRET_ENV: &str = "OAUTH_CLIENT_SECRET";
