//! External collaborator implementations
//!
//! - [`GoogleBooksClient`]: search backend A
//! - [`OpenLibraryClient`]: search backend B
//! - [`OpenAiGenerator`]: structured/free-text generation and vision seed extraction
//!   over an OpenAI-compatible chat-completions endpoint

pub mod google_books;
pub mod open_library;
pub mod openai;

pub use google_books::GoogleBooksClient;
pub use open_library::OpenLibraryClient;
pub use openai::OpenAiGenerator;

use std::num::NonZeroU32;
use std::time::Duration;

pub(crate) const USER_AGENT: &str = concat!("ShelfSense/", env!("CARGO_PKG_VERSION"));

const SEARCH_TIMEOUT_SECS: u64 = 30;

/// Direct (unkeyed) token-bucket limiter shared by one client's calls
pub(crate) type RateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub(crate) fn rate_limiter(per_second: u32) -> RateLimiter {
    let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    governor::RateLimiter::direct(governor::Quota::per_second(rate))
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

pub(crate) fn search_timeout() -> Duration {
    Duration::from_secs(SEARCH_TIMEOUT_SECS)
}
