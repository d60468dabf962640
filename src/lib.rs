//! Backend for a trivia quiz game: browse, search, add and delete questions,
//! and draw quiz questions the player has not seen yet.

pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod routes;
pub mod schema;
pub mod store;
