//! Ready-made wrappers for services commonly needed by integration tests.

pub mod redis;
