#[macro_use]
extern crate diesel;

pub mod auth;
pub mod board;
pub mod client;
pub mod config;
pub mod controllers;
pub mod convert;
pub mod db;
pub mod error;
pub mod realtime;
pub mod seed;
pub mod store;

pub use error::{KanbanError, Result};
