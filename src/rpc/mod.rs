//! Transport-facing layer: JSON-RPC protocol types, the serve loop and the
//! tool dispatcher.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::{handle_line, serve};
