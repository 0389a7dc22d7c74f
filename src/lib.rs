//! mediasift - declarative site adapters for anime streaming sites.
//!
//! This library provides functionality for:
//! - Searching a site's catalogue from a media source configuration
//! - Listing a title's episodes from its detail page
//! - Resolving an episode page to a playable video URL via a remote browser

pub mod adapters;
pub mod cache;
pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod fetch;
pub mod html;
pub mod render;
pub mod source;
pub mod urls;
pub mod utils;

// Re-export commonly used types
pub use adapters::{
    AdapterOp, AdapterOutput, Episode, SearchResult, VideoOutcome, extract_video_url, get_episodes,
    search,
};
pub use cache::{Cache, MemoryCache};
pub use client::MediaClient;
pub use config::Config;
pub use console::Console;
pub use error::{ConfigError, ScraperError};
pub use fetch::{Fetcher, PageSource};
pub use render::{RemoteRenderer, RenderEndpoint, Renderer};
pub use source::{MediaSource, SourceList};
