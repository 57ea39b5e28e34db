//! Authorization server discovery plus the strategies that customize registration and the
//! authorization redirect.

pub mod metadata;
pub mod redirect;
pub mod strategy;

pub use metadata::*;
pub use redirect::*;
pub use strategy::*;
