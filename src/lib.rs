//! The library code for `quire`, the content core of a personal blog. The
//! architecture breaks down into two distinct steps:
//!
//! 1. Indexing post sources ahead of time ([`crate::index`], driven by
//!    [`crate::build`]) into a JSON list of [`post::PostMetadata`]
//! 2. Serving views out of the index ([`crate::site`])
//!
//! The second step is where most of the work happens. Rendering a post turns
//! its markdown into HTML ([`crate::parser`], [`crate::markdown`]) and then
//! strips everything executable out of it ([`crate::sanitize`]). The homepage
//! pairs each post with an image ([`crate::assets`]), and the index view
//! narrows the posts down by tag and free-text query, with the selections
//! kept in the URL ([`crate::filter`]).

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod assets;
pub mod build;
pub mod config;
pub mod filter;
pub mod index;
pub mod markdown;
pub mod parser;
pub mod post;
pub mod preferences;
pub mod sanitize;
pub mod site;
pub mod tagger;
