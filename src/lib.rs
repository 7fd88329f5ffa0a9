//! SupaControl: Kubernetes control plane for multi-tenant provisioning of
//! Supabase instances.
//!
//! This crate implements the reconciliation engine that converges cluster
//! reality (namespace, RBAC, secrets, Helm release, ingresses) to the
//! desired state declared by a `SupabaseInstance` custom resource.

pub mod config;
pub mod controller;
pub mod cr_client;
pub mod crd;
pub mod error;
pub mod telemetry;

#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
