//! End-to-end generation tests, one module per pipeline and target

mod helpers;
mod scenarios;
