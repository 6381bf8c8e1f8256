//! Synthetic relay identities and endpoints.

use std::fmt;

/// Largest relay count whose generated endpoints stay distinct and
/// prefix-free.
///
/// The second and third octets together cover 200 × 200 addresses.
pub const MAX_SAFE_RELAYS: usize = 40_000;

/// A synthetic relay registered by one driver run.
///
/// The id is `load-{token}-{index:03}`; the token is shared by every relay
/// in the run so a listing can be filtered back to this run.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RelayIdentity {
    id: String,
    index: usize,
}

impl RelayIdentity {
    /// Create the identity for relay `index` within run `token`.
    pub fn new(token: &str, index: usize) -> Self {
        Self {
            id: format!("load-{token}-{index:03}"),
            index,
        }
    }

    /// The relay id sent to the control plane.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 0-based position within the run.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The endpoint this relay advertises.
    pub fn endpoint(&self) -> String {
        generate_endpoint(self.index)
    }
}

impl fmt::Display for RelayIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl fmt::Debug for RelayIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelayIdentity({})", self.id)
    }
}

/// Generate a fresh run token (8 lowercase hex characters).
pub fn run_token() -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(8);
    token
}

/// Build every relay identity for a run.
pub fn relays_for_run(token: &str, count: usize) -> Vec<RelayIdentity> {
    (0..count).map(|idx| RelayIdentity::new(token, idx)).collect()
}

/// Derive the advertised `ip:port` endpoint for relay `index`.
///
/// The control plane's sybil check compares endpoint IPs with a plain
/// string prefix match, so `10.0.0.1` and `10.0.0.10` must never appear in
/// the same run. The last octet is always `1` and ports are always five
/// digits, so generated values stay prefix-free for indices below
/// [`MAX_SAFE_RELAYS`].
pub fn generate_endpoint(index: usize) -> String {
    let a = 10;
    let b = (index % 200) + 1;
    let c = ((index / 200) % 200) + 1;
    let d = 1;
    let port = 20000 + (index % 20000);
    format!("{a}.{b}.{c}.{d}:{port}")
}
