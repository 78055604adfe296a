#![allow(async_fn_in_trait)]
pub mod appeears;
pub mod catalog;
pub mod config;
pub mod date_chunks;
pub mod download;
pub mod error;
pub mod job;
pub mod logging;
pub mod orchestrator;
pub mod poller;
pub mod registry;
pub mod remote;
pub mod report;
pub mod request;
pub mod submit;

#[cfg(test)]
mod fake;
