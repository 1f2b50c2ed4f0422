//! PrestAmigo Backend Library
//!
//! This library exports the core modules for the PrestAmigo lending backend:
//! loan lifecycle, installment scheduling, the capital ledger, and the
//! payment-proof workflow.

pub mod capital;
pub mod capital_service;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod loan;
pub mod loan_service;
pub mod middleware;
pub mod notifier;
pub mod phone;
pub mod profile;
pub mod proof_service;
pub mod routes;
pub mod schedule;
pub mod state;
pub mod storage;
