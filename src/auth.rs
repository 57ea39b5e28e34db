//! Auth-domain models: client registration metadata, software statements, and token records.

pub mod client;
pub mod token;

pub use client::*;
pub use token::{record::*, secret::*};
