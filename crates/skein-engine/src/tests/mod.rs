//! Scenario tests for the skein-engine crate.

mod helpers;

mod concurrency;
