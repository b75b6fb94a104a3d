//! Generated protobuf modules for the Zeebe gateway
//!
//! Checked in from `proto/gateway_protocol/gateway.proto` so building the
//! workers does not require `protoc`. Regenerate with `tonic-build`
//! (client only) when the proto subset changes.

pub mod gateway_protocol {
    include!("gateway_protocol.rs");
}

pub use gateway_protocol::gateway_client::GatewayClient;
