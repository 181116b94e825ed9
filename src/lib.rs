pub mod cli;
pub mod completion;
pub mod config;
pub mod convert;
pub mod document;
pub mod engine;
pub mod inspect;
pub mod payload;
pub mod pipeline;
pub mod report;
pub mod sanitize;
pub mod util;
pub mod walk;
