//! Donation ledger contract client with timeout and error handling.
//!
//! # Responsibilities
//! - Submit `recordDonation` through the signing provider and wait for it to be mined
//! - Query contract state, failing over across read providers
//! - Handle timeouts and network errors gracefully
//! - Provide health check for blockchain connectivity

use std::time::Duration;

use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use async_trait::async_trait;
use tokio::time::timeout;

use crate::blockchain::contract::DonationLedger;
use crate::blockchain::types::{
    ChainDonation, ChainError, ChainReceipt, ChainResult, CharityFlow, OnChainDonation,
};
use crate::blockchain::wallet::Wallet;
use crate::config::{BlockchainConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::retries::retry_with_backoff;

type LedgerContract = DonationLedger::DonationLedgerInstance<DynProvider>;

/// Boundary to the deployed donation ledger.
///
/// `record_donation` submits and waits for mining; it fails on RPC errors,
/// signing errors and reverted transactions.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn record_donation(&self, donation: &ChainDonation) -> ChainResult<ChainReceipt>;

    async fn get_donation(&self, chain_donation_id: u64) -> ChainResult<OnChainDonation>;

    /// Contract-assigned ids of every donation recorded for `charity_id`.
    async fn get_donations_by_charity(&self, charity_id: &str) -> ChainResult<Vec<String>>;

    async fn get_charity_flow(&self, charity_id: &str) -> ChainResult<CharityFlow>;

    async fn is_healthy(&self) -> bool;
}

/// Alloy-backed client for the donation ledger contract.
#[derive(Clone)]
pub struct ContractClient {
    /// Contract bound to the signing provider (primary RPC).
    writer: LedgerContract,
    /// Contracts bound to primary + failover providers, in order.
    readers: Vec<LedgerContract>,
    config: BlockchainConfig,
    retry: RetryConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl ContractClient {
    /// Create a new contract client.
    ///
    /// Chain ID mismatches are logged, not fatal, so the service can start
    /// while the RPC endpoint is unreachable.
    pub async fn new(
        config: BlockchainConfig,
        retry: RetryConfig,
        wallet: Wallet,
    ) -> ChainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);

        let contract_address: Address = config.contract_address.parse().map_err(|e| {
            ChainError::InvalidConfig(format!(
                "Invalid contract address '{}': {}",
                config.contract_address, e
            ))
        })?;

        // 1. Signing provider on the primary endpoint
        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            ChainError::InvalidConfig(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        let signing_provider = ProviderBuilder::new()
            .wallet(wallet.to_network_wallet())
            .connect_http(primary_url)
            .erased();
        let writer = DonationLedger::new(contract_address, signing_provider);

        // 2. Read-only failover providers
        let mut readers = vec![writer.clone()];
        for url_str in &config.failover_urls {
            match url_str.parse::<url::Url>() {
                Ok(url) => {
                    let provider = ProviderBuilder::new().connect_http(url).erased();
                    readers.push(DonationLedger::new(contract_address, provider));
                }
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let client = Self {
            writer,
            readers,
            config: config.clone(),
            retry,
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    contract = %contract_address,
                    signer = %wallet.address(),
                    "Contract client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Contract client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> ChainResult<()> {
        let fut = self.writer.provider().get_chain_id();
        let actual = match timeout(self.timeout_duration, fut).await {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => return Err(ChainError::Rpc(e.to_string())),
            Err(_) => return Err(ChainError::Timeout(self.config.rpc_timeout_secs)),
        };
        if actual != self.config.chain_id {
            return Err(ChainError::ChainMismatch {
                expected: self.config.chain_id,
                actual,
            });
        }
        Ok(())
    }

    /// Get the latest block number from the first responsive provider.
    pub async fn get_block_number(&self) -> ChainResult<u64> {
        for (i, reader) in self.readers.iter().enumerate() {
            let fut = reader.provider().get_block_number();
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::Rpc("All providers failed to get block number".to_string()))
    }

    /// Broadcast one `recordDonation` transaction.
    async fn send_record(
        &self,
        donation: &ChainDonation,
    ) -> ChainResult<PendingTransactionBuilder<Ethereum>> {
        let call = self.writer.recordDonation(
            donation.transaction_id.clone(),
            donation.donor_id.clone(),
            donation.charity_id.clone(),
            donation.project_id.clone(),
            U256::from(donation.amount),
            donation.currency.clone(),
            donation.anonymous,
        );

        match timeout(self.timeout_duration, call.send()).await {
            Ok(Ok(pending)) => Ok(pending),
            Ok(Err(e)) => Err(classify_contract_error(e)),
            Err(_) => Err(ChainError::Timeout(self.config.rpc_timeout_secs)),
        }
    }
}

/// Reverts (including failed gas estimation) are final; everything else on
/// the transport is treated as an RPC failure.
fn classify_contract_error(error: alloy::contract::Error) -> ChainError {
    let message = error.to_string();
    if message.to_lowercase().contains("revert") {
        return ChainError::Reverted(message);
    }
    match error {
        alloy::contract::Error::TransportError(_) => ChainError::Rpc(message),
        _ => ChainError::Contract(message),
    }
}

#[async_trait]
impl ChainClient for ContractClient {
    async fn record_donation(&self, donation: &ChainDonation) -> ChainResult<ChainReceipt> {
        let pending =
            retry_with_backoff(&self.retry, "recordDonation", || self.send_record(donation))
                .await?;
        let tx_hash = *pending.tx_hash();

        tracing::info!(
            tx_hash = %tx_hash,
            transaction_id = %donation.transaction_id,
            confirmations = self.config.confirmation_blocks,
            "Donation submitted, waiting for confirmation"
        );

        let receipt = pending
            .with_required_confirmations(u64::from(self.config.confirmation_blocks.max(1)))
            .with_timeout(Some(Duration::from_secs(self.config.receipt_timeout_secs)))
            .get_receipt()
            .await
            .map_err(|e| ChainError::Rpc(format!("Waiting for receipt of {}: {}", tx_hash, e)))?;

        if !receipt.status() {
            return Err(ChainError::Reverted(format!("Transaction {} reverted", tx_hash)));
        }

        let block_number = receipt
            .block_number()
            .ok_or_else(|| ChainError::Rpc(format!("Receipt for {} has no block number", tx_hash)))?;

        let chain_donation_id = receipt.inner.logs().iter().find_map(|log| {
            log.log_decode::<DonationLedger::DonationRecorded>()
                .ok()
                .map(|decoded| decoded.inner.data.donationId.to_string())
        });

        Ok(ChainReceipt {
            transaction_hash: receipt.transaction_hash().to_string(),
            block_number,
            gas_used: receipt.gas_used().to_string(),
            chain_donation_id,
        })
    }

    async fn get_donation(&self, chain_donation_id: u64) -> ChainResult<OnChainDonation> {
        for (i, reader) in self.readers.iter().enumerate() {
            let call = reader.getDonation(U256::from(chain_donation_id));
            match timeout(self.timeout_duration, call.call()).await {
                Ok(Ok(found)) => {
                    return Ok(OnChainDonation {
                        chain_donation_id: chain_donation_id.to_string(),
                        transaction_id: found.transactionId,
                        donor_id: found.donorId,
                        charity_id: found.charityId,
                        project_id: Some(found.projectId).filter(|p| !p.is_empty()),
                        amount: found.amount.to_string(),
                        currency: found.currency,
                        anonymous: found.anonymous,
                        recorded_at: u64::try_from(found.timestamp).unwrap_or(u64::MAX),
                    });
                }
                Ok(Err(e)) => {
                    let err = classify_contract_error(e);
                    if matches!(err, ChainError::Reverted(_)) {
                        return Err(err);
                    }
                    tracing::warn!(provider_idx = i, error = %err, "RPC error, trying next provider");
                }
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout, trying next provider"),
            }
        }
        Err(ChainError::Rpc("All providers failed to get donation".to_string()))
    }

    async fn get_donations_by_charity(&self, charity_id: &str) -> ChainResult<Vec<String>> {
        for (i, reader) in self.readers.iter().enumerate() {
            let call = reader.getDonationsByCharity(charity_id.to_string());
            match timeout(self.timeout_duration, call.call()).await {
                Ok(Ok(result)) => {
                    return Ok(result.donationIds.iter().map(|id| id.to_string()).collect());
                }
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout, trying next provider"),
            }
        }
        Err(ChainError::Rpc("All providers failed to list charity donations".to_string()))
    }

    async fn get_charity_flow(&self, charity_id: &str) -> ChainResult<CharityFlow> {
        for (i, reader) in self.readers.iter().enumerate() {
            let call = reader.getCharityFlow(charity_id.to_string());
            match timeout(self.timeout_duration, call.call()).await {
                Ok(Ok(flow)) => {
                    return Ok(CharityFlow::from_totals(
                        charity_id,
                        flow.totalReceived,
                        flow.totalDisbursed,
                        flow.balance,
                    ));
                }
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout, trying next provider"),
            }
        }
        Err(ChainError::Rpc("All providers failed to get charity flow".to_string()))
    }

    /// Returns true if we can query the block number.
    async fn is_healthy(&self) -> bool {
        let healthy = self.get_block_number().await.is_ok();
        metrics::record_chain_health(healthy);
        healthy
    }
}

impl std::fmt::Debug for ContractClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("contract", &self.config.contract_address)
            .field("readers", &self.readers.len())
            .finish()
    }
}

/// Stand-in used when blockchain integration is disabled. Every call fails,
/// so verifications are recorded as retryable and picked up once enabled.
#[derive(Debug, Clone, Default)]
pub struct DisabledChain;

#[async_trait]
impl ChainClient for DisabledChain {
    async fn record_donation(&self, _donation: &ChainDonation) -> ChainResult<ChainReceipt> {
        Err(ChainError::NotAvailable("blockchain integration disabled".to_string()))
    }

    async fn get_donation(&self, _chain_donation_id: u64) -> ChainResult<OnChainDonation> {
        Err(ChainError::NotAvailable("blockchain integration disabled".to_string()))
    }

    async fn get_donations_by_charity(&self, _charity_id: &str) -> ChainResult<Vec<String>> {
        Err(ChainError::NotAvailable("blockchain integration disabled".to_string()))
    }

    async fn get_charity_flow(&self, _charity_id: &str) -> ChainResult<CharityFlow> {
        Err(ChainError::NotAvailable("blockchain integration disabled".to_string()))
    }

    async fn is_healthy(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_config() -> BlockchainConfig {
        BlockchainConfig {
            enabled: true,
            rpc_url: "http://127.0.0.1:1".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337, // Anvil default
            contract_address: "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
            rpc_timeout_secs: 1,
            confirmation_blocks: 1,
            receipt_timeout_secs: 5,
        }
    }

    fn no_retries() -> RetryConfig {
        RetryConfig {
            enabled: false,
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_client_creation_tolerates_unreachable_rpc() {
        let wallet = Wallet::from_private_key(TEST_KEY, 31337).unwrap();
        let result = ContractClient::new(test_config(), no_retries(), wallet).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_contract_address_rejected() {
        let wallet = Wallet::from_private_key(TEST_KEY, 31337).unwrap();
        let mut config = test_config();
        config.contract_address = "0xnope".to_string();
        let err = ContractClient::new(config, no_retries(), wallet).await.unwrap_err();
        assert!(matches!(err, ChainError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_rpc_failover_exhausts_all_providers() {
        let wallet = Wallet::from_private_key(TEST_KEY, 31337).unwrap();
        let mut config = test_config();
        config.failover_urls.push("http://127.0.0.1:2".to_string());
        config.failover_urls.push("not a url".to_string());

        let client = ContractClient::new(config, no_retries(), wallet).await.unwrap();
        assert_eq!(client.readers.len(), 2);

        let result = client.get_charity_flow("charity_1").await;
        assert!(result.unwrap_err().to_string().contains("All providers failed"));
        assert!(!client.is_healthy().await);
    }

    #[tokio::test]
    async fn test_disabled_chain_reports_not_available() {
        let chain = DisabledChain;
        let donation = ChainDonation {
            transaction_id: "txn".into(),
            donor_id: "d".into(),
            charity_id: "c".into(),
            project_id: String::new(),
            amount: 1,
            currency: "usd".into(),
            anonymous: false,
        };
        assert!(matches!(
            chain.record_donation(&donation).await,
            Err(ChainError::NotAvailable(_))
        ));
        assert!(!chain.is_healthy().await);
    }
}
