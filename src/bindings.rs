//! Solidity ABI bindings for the alliance factory, alliance instances,
//! the settlement-token faucet, and the token standards they touch.

use alloy::sol;

sol!(
    #![sol(all_derives = true, rpc)]

    contract AllianceFactory {
        event AllianceCreated(address allianceAddress, address token, address admin);

        function getAllAlliances() external view returns (address[] memory);
        function createAlliance(
            uint256 _targetPrice,
            uint256 _deadline,
            address[] memory _participants,
            uint256[] memory _shares,
            address _token
        ) external returns (address allianceAddress);
    }
);

sol!(
    #![sol(all_derives = true, rpc)]

    contract Alliance {
        event Deposit(address user, uint256 amount);
        event FundingCancelled();
        event Refunded(address user, uint256 amount);
        event NFTBought(address nftAddress, uint256 tokenId, uint256 price, address seller);
        event Voted(address voter, uint256 weight, address buyer, uint256 price, uint256 saleDeadline);
        event SaleExecuted(address buyer, uint256 price);
        event EmergencyVoted(address voter, uint256 weight, address recipient);
        event EmergencyWithdrawn(address recipient, address nftAddress, uint256 tokenId);

        function state() external view returns (uint8);
        function token() external view returns (address);
        function targetPrice() external view returns (uint256);
        function totalDeposited() external view returns (uint256);
        function deadline() external view returns (uint256);
        function quorumPercent() external view returns (uint256);
        function lossSaleQuorumPercent() external view returns (uint256);
        function minSalePrice() external view returns (uint256);
        function nftAddress() external view returns (address);
        function tokenId() external view returns (uint256);
        function owner() external view returns (address);
        function fundingFailed() external view returns (bool);
        function yesVotesWeight() external view returns (uint256);
        function proposedPrice() external view returns (uint256);
        function proposedSaleDeadline() external view returns (uint256);
        function proposedBuyer() external view returns (address);
        function emergencyVotesWeight() external view returns (uint256);
        function emergencyRecipient() external view returns (address);
        function isPaused() external view returns (bool);
        function getParticipants() external view returns (address[] memory);
        function sharePercent(address participant) external view returns (uint256);
        function contributed(address participant) external view returns (uint256);
        function isParticipant(address account) external view returns (bool);
        function hasVoted(address account) external view returns (bool);
        function hasVotedEmergency(address account) external view returns (bool);

        function deposit(uint256 amount) external;
        function cancelFunding() external;
        function buyNFT(address _nftAddress, uint256 _tokenId, address seller) external;
        function voteToSell(address buyer, uint256 price, uint256 saleDeadline) external returns (bool reached);
        function resetSaleProposal() external;
        function executeSale() external;
        function voteEmergencyWithdraw(address recipient) external returns (bool reached);
        function emergencyWithdrawNFT() external;
        function withdrawRefund() external;
        function pause() external;
        function unpause() external;
    }
);

sol!(
    #![sol(all_derives = true, rpc)]

    contract FATKFaucet {
        event Claimed(address user, uint256 amount, uint256 timestamp);

        function token() external view returns (address);
        function claimAmount() external view returns (uint256);
        function claimCooldown() external view returns (uint256);
        function lastClaimAt(address account) external view returns (uint256);
        function claim() external;
    }
);

sol!(
    #![sol(all_derives = true, rpc)]

    contract IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string memory);
    }
);

sol!(
    #![sol(all_derives = true, rpc)]

    contract IERC721Metadata {
        function tokenURI(uint256 tokenId) external view returns (string memory);
    }
);
