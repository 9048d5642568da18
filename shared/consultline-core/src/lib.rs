//! Consultline Core - Shared domain types and service infrastructure
//!
//! This crate provides:
//! - Standard service trait all microservices must implement
//! - Call session vocabulary (SessionId, CallStatus, PaymentState, ServiceType)
//! - Error handling utilities
//! - Configuration management

pub mod config;
pub mod domain;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use domain::*;
pub use error::{ConsultlineError, Result};
pub use service::{ConsultlineService, MicroserviceRuntime};
