pub mod auth;
pub mod ballot;
pub mod election;
pub mod mongodb;
pub mod store;
