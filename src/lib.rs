//! Quaint RSS: named profiles of RSS feeds, read from the terminal.
//!
//! A profile is a name plus a list of feed URLs, kept in a small JSON file.
//! Reading a profile fetches each feed, parses its items and prints the
//! latest few as short text blocks.

pub mod commands;
pub mod config;
pub mod console;
pub mod feed;
pub mod fetch;
pub mod format;
pub mod store;
