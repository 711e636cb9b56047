pub mod cli;
pub mod commands;
pub mod config;
pub mod doctor;
pub mod errors;
pub mod output;
pub mod recognize;
pub mod references;
pub mod runtime;
