pub mod alerting;
pub mod checkers;
pub mod config;
pub mod notifications;
pub mod runner;
pub mod state;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;
