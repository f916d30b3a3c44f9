//! Wire protocol for communicating with the Droid engine
//!
//! The engine speaks a line-delimited JSON-RPC dialect over stdio. Each line
//! is a JSON object with a fixed envelope and a `type` of `request`,
//! `response` or `notification`.
//!
//! # Example: Building and encoding a request
//!
//! ```rust
//! use kodegen_droid_agent::protocol::{ProtocolMessage, methods};
//! use kodegen_droid_agent::RequestId;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let message = ProtocolMessage::request(
//!     RequestId::from_sequence(1),
//!     methods::INTERRUPT_SESSION,
//!     None,
//! );
//! let line = message.to_line()?;
//! assert!(line.ends_with('\n'));
//!
//! let value: serde_json::Value = serde_json::from_str(line.trim())?;
//! assert_eq!(ProtocolMessage::from_value(&value), Some(message));
//! # Ok(())
//! # }
//! ```

mod messages;
pub mod methods;

pub use messages::{
    FACTORY_API_VERSION, JSONRPC_VERSION, MessageBody, ProtocolMessage, RpcError, RpcNotification,
    RpcRequest, RpcResponse,
};
