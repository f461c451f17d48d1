//! Request processing behind the HTTP handlers.

pub mod health;
pub mod rpc;
