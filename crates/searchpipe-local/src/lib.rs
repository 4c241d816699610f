//! reqwest-backed adapters for searchpipe: the web search providers, the
//! knowledge-base client, the reader (scraping) client, and the engine
//! registry that routes between providers.
//!
//! Adapters share one `reqwest::Client`; construct it once and pass it into
//! each `from_env`.

pub mod dispatch;
pub mod knowledge;
pub mod scrape;
pub mod search;

pub use dispatch::EngineRegistry;
pub use knowledge::KnowledgeClient;
pub use scrape::ReaderClient;
pub use search::{
    BingProvider, ExaProvider, GoogleProvider, LinkupProvider, SerperProvider, TavilyProvider,
};
