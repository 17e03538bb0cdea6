//! HTTP chain oracle for BlockCypher-style REST APIs.
//!
//! `GET {base}/txs/{txid}` returns the decoded transaction; HTTP 404 means the
//! chain does not know it. Data-carrier outputs expose their payload as
//! `data_hex`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::{AnchorError, ChainOracle, ChainTransaction, TxOutput};

/// BlockCypher endpoint for the Bitcoin test network.
pub const BLOCKCYPHER_TESTNET_URL: &str = "https://api.blockcypher.com/v1/btc/test3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ApiTransaction {
    hash: String,
    #[serde(default)]
    outputs: Vec<ApiOutput>,
}

#[derive(Debug, Deserialize)]
struct ApiOutput {
    #[serde(default)]
    value: u64,
    #[serde(default)]
    addresses: Option<Vec<String>>,
    #[serde(default)]
    data_hex: Option<String>,
}

impl ApiTransaction {
    fn decode(self) -> Result<ChainTransaction, AnchorError> {
        let outputs = self
            .outputs
            .into_iter()
            .map(|out| {
                let data = out
                    .data_hex
                    .map(|h| hex::decode(h).map_err(|e| AnchorError::Malformed(e.to_string())))
                    .transpose()?;
                Ok(TxOutput {
                    value: out.value,
                    address: out.addresses.and_then(|a| a.into_iter().next()),
                    data,
                })
            })
            .collect::<Result<Vec<_>, AnchorError>>()?;
        Ok(ChainTransaction {
            txid: self.hash,
            outputs,
        })
    }
}

/// Chain oracle backed by a REST API.
pub struct HttpChainOracle {
    base_url: String,
    client: reqwest::Client,
}

impl HttpChainOracle {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn testnet() -> Self {
        Self::new(BLOCKCYPHER_TESTNET_URL)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChainOracle for HttpChainOracle {
    async fn get_transaction(&self, txid: &str) -> Result<Option<ChainTransaction>, AnchorError> {
        let url = format!("{}/txs/{}", self.base_url, txid);
        let resp = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AnchorError::Oracle(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(AnchorError::Oracle(format!(
                "HTTP {} from {}",
                resp.status(),
                url
            )));
        }

        let body: ApiTransaction = resp
            .json()
            .await
            .map_err(|e| AnchorError::Malformed(e.to_string()))?;
        body.decode().map(Some)
    }

    fn name(&self) -> &str {
        "http"
    }
}
