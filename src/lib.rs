//! Backend for a bilingual (Arabic-first) corporate website.
//!
//! The reusable pieces are [`slug`], [`settings`] and [`scopes`]; the
//! [`content`], [`contact`] and [`api`] modules are thin layers on top.

pub mod api;
pub mod config;
pub mod contact;
pub mod content;
pub mod db;
pub mod error;
pub mod scopes;
pub mod settings;
pub mod slug;

pub use error::{Result, SiteError};
