pub mod config;
pub mod engine;
pub mod history;
pub mod http_client;
pub mod injury;
pub mod model;
pub mod predictor;
pub mod reference_fetch;
pub mod results_fetch;
pub mod schedule;
pub mod store;
pub mod strength;
pub mod teams;
