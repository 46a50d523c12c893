pub mod analytics;
pub mod entry;
pub mod event;
pub mod holding;
pub mod quote;
