//! Auxiliary read-only feeds: futures quotes and the news/blog listings.
//!
//! Both are polled in the background and served from a [`SnapshotStore`],
//! the same way the screener vocabulary is.
//!
//! [`SnapshotStore`]: crate::vocabulary::SnapshotStore

pub mod futures;
pub mod news;

pub use futures::{fetch_futures, parse_futures, select_futures, FutureQuote, FuturesBoard};
pub use news::{eastern_today, fetch_news, parse_news_and_blogs, NewsFeed, NewsRecord};
