// lib.rs - Core library structure for the wallet

pub mod config;
pub mod crypto;
pub mod errors;
pub mod explorer;
pub mod retry;
pub mod rlp;
pub mod rpc;
pub mod storage;
pub mod transaction;
pub mod units;
pub mod validation;
pub mod wallet;

// Re-export common types
pub use config::{ConfigStore, ExplorerConfig, NetworkConfig, RpcConfig, TransactionConfig, WalletConfig};
pub use errors::{WalletError, WalletResult};
pub use explorer::{ExplorerClient, HistoryEntry};
pub use rpc::{BalanceBreakdown, RpcGateway, TxStatus, TxStatusReport};
pub use storage::{WalletPaths, WalletRecord};
pub use transaction::{SignedTransaction, TransactionManager, TransferReceipt, UnsignedTransaction};
pub use validation::InputValidator;
pub use wallet::{WalletInfo, WalletManager, WalletSummary};
