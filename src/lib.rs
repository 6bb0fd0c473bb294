pub mod app;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod input;
pub mod output;
pub mod pool;
pub mod retry;
pub mod scheduler;
pub mod uniprot;
