//! Common test utilities and helpers.
//!
//! This module provides shared functionality for all tests, including:
//! - Document fixtures built operator by operator
//! - Redaction assertions backed by an independent extractor
//! - PDF inspection helpers

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod pdf_helpers;

pub use assertions::*;
pub use fixtures::*;
pub use pdf_helpers::*;
