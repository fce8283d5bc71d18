//! jdbroker: a debug-control broker.
//!
//! The broker owns exactly one debug session against a JVM-style target and
//! reconciles two mismatched worlds: clients speak synchronous JSON-RPC
//! request/response, the target produces asynchronous events. The event
//! pump classifies incoming events, keeps the last stop reason, resolves
//! deferred breakpoints and feeds the monitoring ring; `wait_for_stop` is
//! the blocking primitive that lets request/response clients observe the
//! asynchronicity.
//!
//! A concrete debug-wire implementation is not part of this crate:
//! embedders implement [`broker::adapter::TargetConnector`] and
//! [`broker::adapter::DebugTarget`] and hand the connector to
//! [`broker::Broker::new`], then drive [`rpc::serve`] over stdio.

pub mod broker;
pub mod rpc;
