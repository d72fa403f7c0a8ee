//! Test suites for the tablet harness lifecycle.

mod support;
mod unit;
