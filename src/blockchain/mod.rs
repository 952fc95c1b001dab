//! Blockchain subsystem: RPC client, head subscription, wallets.

pub mod blocks;
pub mod client;
pub mod types;
pub mod wallet;

pub use blocks::BlockSource;
pub use client::ChainClient;
pub use types::{BlockInfo, BlockchainError, ChainId};
pub use wallet::Wallet;
