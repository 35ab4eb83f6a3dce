//! In-memory persistence for the contacts resource.

mod contacts;

pub use contacts::*;
