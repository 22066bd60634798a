//! Gatekeeper - API Gateway with Admission Control
//!
//! This crate implements a small HTTP gateway whose one piece of decision
//! logic is request admission: every request is counted against a per-client
//! fixed window and rejected with `429 Too Many Requests` once the client has
//! used its allowance for that window.

pub mod admission;
pub mod config;
pub mod error;
pub mod http;
