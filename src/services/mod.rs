//! Business logic services.
//!
//! Services contain the saga and its collaborators, separated from HTTP
//! handlers: the account-service client, the transfer orchestrator, and the
//! institution health monitor.

pub mod account_client;
pub mod health_service;
pub mod transfer_service;
