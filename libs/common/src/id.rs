use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = relay_common::id::prefixed_ulid("ch");
/// assert!(id.starts_with("ch_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const SERVER: &str = "srv";
    pub const CHANNEL: &str = "ch";
    pub const CONNECTION: &str = "cxn";
}
