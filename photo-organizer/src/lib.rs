pub mod config;
pub mod oauth_flow;
pub mod organize;
pub mod session;
pub mod storage;
pub mod token_provider;
