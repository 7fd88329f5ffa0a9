//! Custom Resource Definitions for SupaControl
//!
//! This module defines the `SupabaseInstance` CRD used to declare and
//! observe tenant Supabase deployments.

mod instance;
mod types;

pub use instance::{ExternalStatus, SupabaseInstance, SupabaseInstanceSpec, SupabaseInstanceStatus};
pub use types::*;
