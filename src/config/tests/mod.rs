//! Unit tests for tocker configuration.
//!
//! This module contains tests organised into:
//! - [`helpers`] - Shared fixtures and helper functions
//! - [`types_tests`] - Defaults and TOML deserialisation
//! - [`validation`] - `TockerConfig::validate` checks
//! - [`layer_precedence_tests`] - `MergeComposer` layer precedence
//! - [`loader_tests`] - `load_config` against files and a mocked environment

mod helpers;
