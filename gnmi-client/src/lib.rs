//! gNMI (gRPC Network Management Interface) client library
//!
//! This crate connects to gNMI-enabled network devices and exposes the four
//! service RPCs: capability discovery, snapshot reads, configuration writes
//! and streaming subscriptions delivered as an event stream.
//!
//! - [`client`] - The [`GnmiClient`], its builder and request options
//! - [`subscription`] - Subscription event streaming with cancellation
//! - [`path`] - XPath-like path parsing and rendering
//! - [`error`] - Error types

pub mod client;
pub mod error;
pub mod path;
pub mod subscription;

// Protobuf code generated from the schemas under proto/, committed so that
// building does not require protoc.
pub mod gnmi;
pub mod gnmi_ext;

// Re-export commonly used types at the crate root
pub use client::{ClientBuilder, GnmiClient, SubscribeOptions, TlsOptions};
pub use error::{Error, Result};
pub use subscription::{SubscriptionEvent, SubscriptionStream};
