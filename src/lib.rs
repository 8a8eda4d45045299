pub mod config;
pub mod report;
pub mod spec;
pub mod suite;
pub mod verifier;
