pub mod handlers;
pub mod masking;
pub mod repo;
pub mod verification;
