pub mod api;
pub mod billing;
pub mod config;
pub mod domain;
pub mod error;
pub mod notifier;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod uploads;
