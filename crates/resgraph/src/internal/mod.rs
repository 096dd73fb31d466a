#[macro_use]
pub(crate) mod common;
pub mod config;
pub mod graph;
pub mod jobspec;
pub mod planner;
pub mod policy;
pub mod query;
pub mod scoring;
pub mod traverser;

#[cfg(test)]
pub mod tests;
