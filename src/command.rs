//! Command routing to the shade proxies.
//!
//! Commands are user intent and bypass the freshness machinery: a single
//! synchronous proxy call each, no retry, no queuing. Failures propagate to
//! the caller.

use crate::error::{BridgeError, Result};
use crate::gateway::ShadeProxy;
use crate::shade::vendor_position;

/// Host-issued command against one shade. Levels use the host convention
/// (100 = fully open).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ShadeCommand {
    Open,
    Close,
    /// Move to a host level in 0-100.
    #[strum(serialize = "SetLevel")]
    SetLevel(u8),
}

/// Route one command to the proxy, translating host levels to vendor
/// positions on the way.
pub async fn route(proxy: &dyn ShadeProxy, command: ShadeCommand) -> Result<()> {
    match command {
        ShadeCommand::Open => proxy.open().await,
        ShadeCommand::Close => proxy.close().await,
        ShadeCommand::SetLevel(level) => {
            if level > 100 {
                return Err(BridgeError::InvalidLevel(level));
            }
            proxy.set_position(vendor_position(level)).await
        }
    }
}
