//! Strategy implementation seam

use shared::{Address, StrategyId};
use std::fmt;

/// What a handler knows about the call it is serving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub strategy: StrategyId,
    pub caller: Address,
}

/// A strategy implementation registered with the router
///
/// `address()` identifies the implementation; the zero address stands for
/// "no implementation" and is rejected at registration.
pub trait StrategyHandler: Send + Sync {
    fn address(&self) -> Address;

    /// Run the strategy. An `Err` is reported to the caller as `ExecutionFailed`.
    fn execute(&self, ctx: &ExecutionContext, data: &[u8]) -> Result<Vec<u8>, String>;

    /// Cheap pre-check, no side effects
    fn validate(&self, _data: &[u8]) -> bool {
        true
    }
}

/// Handler backed by a closure
pub struct FnHandler<F> {
    address: Address,
    run: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&ExecutionContext, &[u8]) -> Result<Vec<u8>, String> + Send + Sync,
{
    pub fn new(address: Address, run: F) -> Self {
        Self { address, run }
    }
}

impl<F> StrategyHandler for FnHandler<F>
where
    F: Fn(&ExecutionContext, &[u8]) -> Result<Vec<u8>, String> + Send + Sync,
{
    fn address(&self) -> Address {
        self.address
    }

    fn execute(&self, ctx: &ExecutionContext, data: &[u8]) -> Result<Vec<u8>, String> {
        (self.run)(ctx, data)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("address", &self.address).finish()
    }
}
