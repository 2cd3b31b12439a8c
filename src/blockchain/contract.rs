//! ABI bindings for the deployed donation ledger contract.

use alloy::sol;

sol! {
    /// Append-only registry of confirmed donations and per-charity totals.
    #[sol(rpc)]
    contract DonationLedger {
        /// Emitted once per recorded donation.
        event DonationRecorded(
            uint256 indexed donationId,
            string transactionId,
            string charityId,
            uint256 amount
        );

        function recordDonation(
            string transactionId,
            string donorId,
            string charityId,
            string projectId,
            uint256 amount,
            string currency,
            bool anonymous
        ) external returns (uint256 donationId);

        function getDonation(uint256 donationId) external view returns (
            string transactionId,
            string donorId,
            string charityId,
            string projectId,
            uint256 amount,
            string currency,
            bool anonymous,
            uint256 timestamp
        );

        function getDonationsByCharity(string charityId) external view returns (
            uint256[] donationIds,
            uint256 count
        );

        function getCharityFlow(string charityId) external view returns (
            uint256 totalReceived,
            uint256 totalDisbursed,
            uint256 balance
        );
    }
}
