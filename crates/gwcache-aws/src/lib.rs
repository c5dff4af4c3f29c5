//! Provider adapters for gwcache.
//!
//! The cloud SDK is reached through a single generic `invoke` call on an HTTP
//! bridge. The gateway and stack adapters build on that call and classify its
//! failures once.

pub mod cloudformation;
pub mod gateway;
pub mod invoker;

pub use cloudformation::CloudFormationClient;
pub use gateway::ApiGatewayClient;
pub use invoker::{BridgeConfig, HttpInvoker};
