pub mod application;
pub mod company;
pub mod employment;
pub mod engagement;
pub mod enums;
pub mod invite;
pub mod job_listing;
pub mod messaging;
pub mod notification;
pub mod user;
