pub mod analytics_service;
pub mod entry_ledger;
pub mod investment_ledger;
pub mod news_service;
pub mod notifier;
pub mod session_service;
