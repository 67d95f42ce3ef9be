//! Integration tests for faultline-transport
//!
//! Uses wiremock to simulate the collection endpoint and verifies how the
//! SubmissionClient classifies real HTTP exchanges.

mod common;

mod test_submit;
