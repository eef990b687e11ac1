pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod limiter;
pub mod llm;
pub mod logging;
pub mod recommend;
pub mod runtime;
pub mod web;
