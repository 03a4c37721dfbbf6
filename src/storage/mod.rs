pub mod paths;
pub mod records;

pub use paths::WalletPaths;
pub use records::{DefaultPointer, FsRecordStore, RecordStore, WalletRecord};
