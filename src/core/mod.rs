/*!
 * Core Types
 * Scalar types and the error taxonomy shared across the enforcement layer
 */

pub mod errors;
pub mod types;

pub use errors::*;
pub use types::*;
