pub mod api;
pub mod auth;
pub mod capture;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod forwarder;
pub mod outbound;
pub mod registry;
pub mod replayer;

#[cfg(test)]
mod test_helpers;
