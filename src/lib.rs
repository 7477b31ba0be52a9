pub mod auction;
pub mod bidding;
pub mod error;
pub mod event_stream;
pub mod handlers;
pub mod ledger;
pub mod payment;
pub mod query;
pub mod scheduler;
pub mod store;
