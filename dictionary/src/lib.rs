//! # Dictionary Import
//!
//! Pulls definitions from the Rangjung Yeshe MediaWiki and turns them into
//! `definition` documents for the knowledge base.
//!
//! ```rust,ignore
//! use rigpa_dictionary::DictionaryClient;
//!
//! let client = DictionaryClient::new("https://rywiki.tsadra.org/api.php");
//! let docs = client.import_common_terms(&mut |done, total| {
//!     eprintln!("{done}/{total}");
//! }).await;
//! kb.add_documents(docs).await;
//! ```

pub mod client;
pub mod error;
pub mod wikitext;

pub use client::{
    COMMON_TERMS, DictionaryClient, SOURCE_NAME, SiteStats, TitleMatch, parse_list,
    title_from_url,
};
pub use error::{DictionaryError, Result};
pub use wikitext::wikitext_to_plain;
