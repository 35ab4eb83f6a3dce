//! Request handlers for the contacts resource.

mod contacts;

pub use contacts::*;
