pub mod config;
pub mod logging;

pub mod catalog;
pub mod checksum;
pub mod control;
pub mod download;
pub mod error;
pub mod http;
pub mod job;
pub mod pipeline;
pub mod poll;
pub mod provider;
pub mod retry;
pub mod storage;
pub mod submit;

pub use error::JobError;
