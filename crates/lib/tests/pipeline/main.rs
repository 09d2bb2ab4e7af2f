//! End-to-end pipeline tests against a scripted toolchain.

mod common;

mod build_tests;
mod failure_tests;
mod schema_tests;
