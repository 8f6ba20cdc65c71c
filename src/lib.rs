//! Contract verification harness for a product catalog REST API.
//!
//! Scenarios send real HTTP requests through [`http::ApiClient`], check the
//! responses with the assertions in [`testing`], and are executed by
//! [`runner::Runner`], which produces a [`testing::RunReport`].

pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod runner;
pub mod storage;
pub mod stub;
pub mod suites;
pub mod testing;
