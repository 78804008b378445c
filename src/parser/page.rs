//! Page-shape scanning: repeated `<article>` blocks in an HTML page.

use crate::error::ExtractionError;
use crate::models::{RawTimestamp, RecordDraft, TimestampFormat};
use scraper::{ElementRef, Html, Selector};

struct PageSelectors {
    article: Selector,
    heading: Selector,
    link: Selector,
    paragraph: Selector,
    time: Selector,
}

impl PageSelectors {
    fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            article: parse_selector("article")?,
            heading: parse_selector("h1, h2, h3, h4")?,
            link: parse_selector("a[href]")?,
            paragraph: parse_selector("p")?,
            time: parse_selector("time[datetime]")?,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::Selector(format!("{css}: {e}")))
}

/// Collect one draft per `<article>` element, in document order.
pub fn scan(body: &str) -> Result<Vec<RecordDraft>, ExtractionError> {
    let selectors = PageSelectors::new()?;
    let document = Html::parse_document(body);

    Ok(document
        .select(&selectors.article)
        .map(|article| draft_from_article(article, &selectors))
        .collect())
}

fn draft_from_article(article: ElementRef<'_>, selectors: &PageSelectors) -> RecordDraft {
    let title = article
        .select(&selectors.heading)
        .next()
        .map(|h| h.text().collect::<String>());

    let link = article
        .select(&selectors.link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);

    let description = article
        .select(&selectors.paragraph)
        .next()
        .map(|p| p.inner_html());

    let published = article
        .select(&selectors.time)
        .next()
        .and_then(|t| t.value().attr("datetime"))
        .map(|text| RawTimestamp {
            text: text.to_string(),
            format: TimestampFormat::Iso8601,
        });

    RecordDraft {
        title,
        link,
        description,
        published,
    }
}
