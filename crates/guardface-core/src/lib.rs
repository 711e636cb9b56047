//! Face reference enrollment and verification.
//!
//! A [`faces::Recognizer`] turns a photo and a claimed guard id into an
//! accept/reject decision: the first face seen for an id becomes its stored
//! reference, later faces are compared against it.

pub mod errors;
pub mod faces;
