//! JSON-RPC client for the FairCoin daemon
//!
//! Sends JSON-RPC 1.0 requests over plain HTTP with basic authentication.
//! One request per call; no batching, retries or id correlation.

pub mod client;
#[cfg(test)]
pub(crate) mod mock;

pub use client::{RpcClient, RpcError, RpcRequest, JSONRPC_VERSION, REQUEST_ID};
