pub mod common;
pub mod config;
pub mod logging;
pub mod organizer;
pub mod output;
pub mod pipeline;
pub mod scanner;
pub mod sources;
pub mod storage;

pub use common::{Result, ScraperError};
