//! News and blog listings.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc, Weekday};
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ParseError, ProxyError};
use crate::upstream::UpstreamClient;
use crate::vocabulary::{element_text, selector};

/// Output date format, e.g. `Oct-16 2026`.
pub const DATE_FORMAT: &str = "%b-%d %Y";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub date: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsFeed {
    pub news: Vec<NewsRecord>,
    pub blogs: Vec<NewsRecord>,
}

/// Current calendar date in US Eastern time.
pub fn eastern_today() -> NaiveDate {
    let now = Utc::now();
    let offset_hours = if in_us_daylight_time(now) { -4 } else { -5 };
    FixedOffset::east_opt(offset_hours * 3600)
        .map(|offset| now.with_timezone(&offset).date_naive())
        .unwrap_or_else(|| now.date_naive())
}

/// US daylight saving: second Sunday of March 07:00 UTC to first Sunday of
/// November 06:00 UTC.
fn in_us_daylight_time(now: DateTime<Utc>) -> bool {
    let switch = |month: u32, nth: u8, hour: u32| {
        NaiveDate::from_weekday_of_month_opt(now.year(), month, Weekday::Sun, nth)
            .and_then(|day| day.and_hms_opt(hour, 0, 0))
            .map(|at| Utc.from_utc_datetime(&at))
    };

    match (switch(3, 2, 7), switch(11, 1, 6)) {
        (Some(start), Some(end)) => now >= start && now < end,
        _ => false,
    }
}

/// Extract the news (first) and blog (second) listings of the news page.
///
/// `today` stamps entries whose date cell only shows a time of day.
pub fn parse_news_and_blogs(html: &str, today: NaiveDate) -> Result<NewsFeed, ParseError> {
    let document = Html::parse_document(html);
    let table_selector = selector("table.styled-table-new")?;

    let mut tables = document.select(&table_selector);
    let news = match tables.next() {
        Some(table) => parse_links(&table, today)?,
        None => Vec::new(),
    };
    let blogs = match tables.next() {
        Some(table) => parse_links(&table, today)?,
        None => Vec::new(),
    };

    Ok(NewsFeed { news, blogs })
}

fn parse_links(table: &ElementRef<'_>, today: NaiveDate) -> Result<Vec<NewsRecord>, ParseError> {
    let row_selector = selector("tr.news_table-row")?;
    let link_selector = selector("a")?;
    let date_selector = selector("td.news_date-cell")?;

    let year = today.format("%Y").to_string();
    let mut records = Vec::new();

    for row in table.select(&row_selector) {
        let Some(link) = row.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let raw_date = row
            .select(&date_selector)
            .next()
            .map(|cell| element_text(&cell))
            .unwrap_or_default();
        let date = if raw_date.ends_with("AM") || raw_date.ends_with("PM") {
            today.format(DATE_FORMAT).to_string()
        } else {
            format!("{} {}", raw_date, year)
        };

        records.push(NewsRecord {
            date,
            title: element_text(&link),
            url: href.to_string(),
        });
    }

    Ok(records)
}

pub async fn fetch_news(client: &UpstreamClient) -> Result<NewsFeed, ProxyError> {
    let page = client.fetch_news().await?;
    let html = String::from_utf8_lossy(&page);
    let feed = parse_news_and_blogs(&html, eastern_today())?;
    info!(news = feed.news.len(), blogs = feed.blogs.len(), "News fetched");
    Ok(feed)
}
