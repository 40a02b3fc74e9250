//! HTTP transport for fetching peer chains.

use petchain_chain::PrefetchedChains;
use petchain_core::Block;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body of `GET /chain`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

/// Fetches `GET /chain` from peers over HTTP.
#[derive(Clone)]
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Fetch every peer's chain. Peers that fail are logged and left out, so
    /// conflict resolution sees them as unreachable.
    pub async fn fetch_all(&self, peers: &[String]) -> PrefetchedChains {
        let mut chains = PrefetchedChains::new();
        for peer in peers {
            match self.fetch(peer).await {
                Ok(chain) => chains.insert(peer.clone(), chain),
                Err(error) => tracing::warn!(%peer, %error, "failed to fetch chain"),
            }
        }
        chains
    }

    async fn fetch(&self, peer: &str) -> anyhow::Result<Vec<Block>> {
        let url = format!("http://{}/chain", peer);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: ChainResponse = response.json().await?;
        if body.length != body.chain.len() {
            anyhow::bail!(
                "reported length {} but sent {} blocks",
                body.length,
                body.chain.len()
            );
        }
        Ok(body.chain)
    }
}
