pub mod admin;
pub mod plans;
pub mod root;
pub mod subscriptions;
pub mod types;
