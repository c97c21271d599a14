//! # Naturae Common Library
//!
//! Shared code for the Naturae species-learning service:
//! - Database schema and queries (decks, cards, media, species, progress)
//! - Configuration loading and root folder resolution
//! - Bulk import parsers (filenames, pasted spreadsheet text)
//! - Image annotation model
//! - Deck export document
//! - Storage quota accounting and review scheduling

pub mod annotations;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod import;
pub mod quota;
pub mod review;
pub mod text;

pub use error::{Error, Result};
