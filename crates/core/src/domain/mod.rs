pub mod authorization;
pub mod document;
pub mod notification;
pub mod user;
pub mod validation;
