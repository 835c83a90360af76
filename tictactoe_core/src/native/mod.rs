// Native implementations

pub mod rpc_impl;
pub mod timer;

pub use rpc_impl::NativeRpcClient;
pub use timer::TokioSleeper;
