//! Peer addresses and the seam used to fetch their chains.

use crate::error::{LedgerError, Result};
use petchain_core::Block;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::warn;

/// Errors returned by a [`PeerClient`].
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer {address} unreachable: {reason}")]
    Unreachable { address: String, reason: String },

    #[error("peer {address} returned an invalid response: {reason}")]
    InvalidResponse { address: String, reason: String },
}

/// Fetches the full chain held by a peer.
pub trait PeerClient {
    fn fetch_chain(&self, address: &str) -> std::result::Result<Vec<Block>, PeerError>;
}

/// Chains obtained ahead of time, served as if fetched live.
///
/// Lets an async transport do the network I/O up front and hand the results
/// to synchronous conflict resolution. Addresses without an entry are
/// reported as unreachable.
#[derive(Debug, Clone, Default)]
pub struct PrefetchedChains {
    chains: HashMap<String, Vec<Block>>,
}

impl PrefetchedChains {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: impl Into<String>, chain: Vec<Block>) {
        self.chains.insert(address.into(), chain);
    }
}

impl PeerClient for PrefetchedChains {
    fn fetch_chain(&self, address: &str) -> std::result::Result<Vec<Block>, PeerError> {
        self.chains
            .get(address)
            .cloned()
            .ok_or_else(|| PeerError::Unreachable {
                address: address.to_string(),
                reason: "no chain fetched".into(),
            })
    }
}

/// Normalize a peer address to `host:port`.
///
/// Accepts a bare `host:port` or a URL such as `http://host:port/path`.
pub fn normalize_address(address: &str) -> Result<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidNodeAddress("empty address".into()));
    }

    let without_scheme = match trimmed.split_once("://") {
        Some((_, rest)) => rest,
        None => trimmed,
    };
    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();

    let (host, port) = authority
        .rsplit_once(':')
        .ok_or_else(|| LedgerError::InvalidNodeAddress(format!("`{}` has no port", address)))?;

    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(LedgerError::InvalidNodeAddress(format!(
            "`{}` has no host",
            address
        )));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| LedgerError::InvalidNodeAddress(format!("`{}` has an invalid port", address)))?;
    if port == 0 {
        return Err(LedgerError::InvalidNodeAddress(format!(
            "`{}` has an invalid port",
            address
        )));
    }

    Ok(format!("{}:{}", host.to_ascii_lowercase(), port))
}

/// The set of known peers, normalized and ordered.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct NodeSet {
    nodes: BTreeSet<String>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer. Returns the normalized address; registering the same
    /// peer twice is a no-op.
    pub fn register(&mut self, address: &str) -> Result<String> {
        let normalized = normalize_address(address)?;
        self.nodes.insert(normalized.clone());
        Ok(normalized)
    }

    pub fn contains(&self, address: &str) -> bool {
        normalize_address(address)
            .map(|a| self.nodes.contains(&a))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.nodes.iter().cloned().collect()
    }
}

/// Fetch chains from every peer, skipping (and logging) those that fail.
pub fn fetch_candidates(nodes: &NodeSet, client: &dyn PeerClient) -> Vec<(String, Vec<Block>)> {
    let mut candidates = Vec::with_capacity(nodes.len());
    for address in nodes.iter() {
        match client.fetch_chain(address) {
            Ok(chain) => candidates.push((address.to_string(), chain)),
            Err(err) => warn!(peer = %address, error = %err, "skipping peer"),
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_address("http://192.168.0.5:5000/chain").unwrap(),
            "192.168.0.5:5000"
        );
        assert_eq!(
            normalize_address("https://Node-B.local:8080").unwrap(),
            "node-b.local:8080"
        );
    }

    #[test]
    fn test_normalize_bare_address() {
        assert_eq!(normalize_address(" localhost:5002 ").unwrap(), "localhost:5002");
    }

    #[test]
    fn test_invalid_addresses_rejected() {
        for bad in ["", "   ", "http://", "localhost", ":5000", "host:notaport", "host:0"] {
            assert!(
                matches!(normalize_address(bad), Err(LedgerError::InvalidNodeAddress(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_register_idempotent() {
        let mut nodes = NodeSet::new();
        nodes.register("http://localhost:5002/").unwrap();
        nodes.register("localhost:5002").unwrap();

        assert_eq!(nodes.len(), 1);
        assert!(nodes.contains("http://localhost:5002"));
    }

    #[test]
    fn test_fetch_candidates_skips_unreachable() {
        let mut nodes = NodeSet::new();
        nodes.register("a:1").unwrap();
        nodes.register("b:2").unwrap();

        let mut chains = PrefetchedChains::new();
        chains.insert("b:2", vec![Block::genesis()]);

        let candidates = fetch_candidates(&nodes, &chains);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].0, "b:2");
    }
}
