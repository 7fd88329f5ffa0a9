//! Thin HTTP façade over the CR Client: enough surface to poll
//! and mutate `SupabaseInstance` state without touching the Kubernetes API
//! directly. Unauthenticated by design — see the crate's Non-goals.

pub mod dto;
pub mod handlers;
pub mod server;

pub use server::run_server;
