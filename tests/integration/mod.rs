//! Integration tests for procwarden supervision
//!
//! These tests run real `/bin/sh` children that report through the file
//! signal channels under a temporary shared directory.

pub mod helpers;
pub mod signal_requests;
pub mod supervisor_lifecycle;
