// src/research/mod.rs

pub mod provider;
pub mod scraper;

pub use provider::ResearchProvider;
pub use scraper::{
    BrowserSearch, HttpFetcher, HttpSearch, PageFetcher, SearchHit, SearchStrategy, WebSearch,
};
