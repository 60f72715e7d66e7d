//! Authentication: password hashing, JWT access/refresh pairs with
//! server-side refresh rotation, and the request extractors.

pub mod extractor;
pub mod handlers;
pub mod password;
pub mod refresh_store;
pub mod session;
pub mod tokens;

pub use extractor::{AuthUser, MaybeAuthUser};
