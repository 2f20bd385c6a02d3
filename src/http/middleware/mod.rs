//! Request middleware.

pub mod admission;

pub use admission::{protected_admission, public_admission};
