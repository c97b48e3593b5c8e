//! Command handlers - extracted from main.rs for testability

pub mod convert;
pub mod run;
