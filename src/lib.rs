//! Sandwich symmetry evaluator.
//!
//! Upload a sandwich photo, let Gemini find and describe it, score how well
//! its left half mirrors its right, and get roasted for the result.

pub mod config;
pub mod critic;
pub mod error;
pub mod gemini;
pub mod localize;
pub mod pipeline;
pub mod retry;
pub mod server;
pub mod symmetry;

pub use error::{AppError, ServiceError, SymmetryError};
pub use symmetry::{evaluate, BoundingBox, SymmetryResult, SymmetryScorer};
