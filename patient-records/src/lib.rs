//! Patient records library
//!
//! Persistence core of the patient-records desktop application: schema,
//! image store, sync outbox and transactional record services.

pub mod app;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod storage;
