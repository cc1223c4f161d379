//! Shared types for GroupDrive.
//!
//! Every crate in the workspace addresses users by [`Identity`], so the
//! canonical (lower-cased) form is decided in exactly one place.

mod identity;

pub use identity::{Identity, IdentityError};
