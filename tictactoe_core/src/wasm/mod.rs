// WASM-specific implementations
pub mod rpc;
pub mod transaction_signer;
pub mod utils;

// Re-exports
pub use rpc::*;
pub use transaction_signer::*;
pub use utils::*;
