pub mod cache;
pub mod classify;
pub mod config;
pub mod fetch;
pub mod harness;
pub mod locate;
pub mod merge;
pub mod model;
pub mod parse;
pub mod pipeline;
pub mod quota;
pub mod reconcile;
pub mod store;
