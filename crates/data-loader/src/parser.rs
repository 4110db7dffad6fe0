//! Parsers for the raw newline-delimited JSON dataset files.
//!
//! Two files are read:
//! - product metadata: one JSON object per line, heterogeneous field shapes
//! - review events: `{parent_asin, rating, timestamp}` per line
//!
//! Source records are untrusted. A field of the wrong shape degrades to
//! `None` on the normalized record; a line that isn't JSON at all is
//! skipped and counted, never fatal.

use crate::error::Result;
use crate::types::*;
use serde::Deserialize;
use serde_json::Value;
use std::io::BufRead;

// =============================================================================
// Raw Records
// =============================================================================

/// A field that may hold the expected type or something else entirely
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Lenient<T> {
    Valid(T),
    Invalid(Value),
}

impl<T> Lenient<T> {
    pub fn valid(self) -> Option<T> {
        match self {
            Lenient::Valid(value) => Some(value),
            Lenient::Invalid(_) => None,
        }
    }

    pub fn as_valid(&self) -> Option<&T> {
        match self {
            Lenient::Valid(value) => Some(value),
            Lenient::Invalid(_) => None,
        }
    }
}

/// Price as found in the wild: a number, a display string or junk
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceField {
    Number(f64),
    Text(String),
    Other(Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DescriptionField {
    Text(String),
    List(Vec<Value>),
    Other(Value),
}

/// One line of the metadata file before normalization
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProductRecord {
    #[serde(default)]
    pub parent_asin: Option<Lenient<String>>,
    #[serde(default)]
    pub asin: Option<Lenient<String>>,
    #[serde(default)]
    pub title: Option<Lenient<String>>,
    #[serde(default)]
    pub description: Option<DescriptionField>,
    #[serde(default)]
    pub features: Option<Lenient<Vec<Value>>>,
    #[serde(default, rename = "imageURLHighRes")]
    pub image_url_high_res: Option<Lenient<Vec<Value>>>,
    #[serde(default, rename = "imageURL")]
    pub image_url: Option<Lenient<Vec<Value>>>,
    #[serde(default)]
    pub images: Option<Lenient<Vec<Value>>>,
    #[serde(default)]
    pub price: Option<PriceField>,
    #[serde(default)]
    pub average_rating: Option<Lenient<f64>>,
    #[serde(default)]
    pub rating_number: Option<Lenient<f64>>,
    #[serde(default)]
    pub store: Option<Lenient<String>>,
    #[serde(default)]
    pub categories: Option<Lenient<Vec<Value>>>,
}

impl RawProductRecord {
    /// Product key: `parent_asin`, else `asin`
    pub fn product_id(&self) -> Option<&str> {
        [&self.parent_asin, &self.asin]
            .into_iter()
            .filter_map(|field| field.as_ref().and_then(Lenient::as_valid))
            .map(String::as_str)
            .find(|id| !id.is_empty())
    }

    /// Normalize into a [`Product`]; `None` when the record has no key
    pub fn into_product(self) -> Option<Product> {
        let id = self.product_id()?.to_string();

        let title = self
            .title
            .and_then(Lenient::valid)
            .unwrap_or_else(|| format!("Product {}", id));
        let image_url = first_image_url(
            self.image_url_high_res.as_ref(),
            self.image_url.as_ref(),
            self.images.as_ref(),
        );
        let description = truncate_description(&resolve_description(
            self.description.as_ref(),
            self.features.as_ref(),
        ));
        let categories = self
            .categories
            .and_then(Lenient::valid)
            .map(|values| {
                values
                    .iter()
                    .filter_map(value_to_text)
                    .take(MAX_CATEGORIES)
                    .collect()
            })
            .unwrap_or_default();

        Some(Product {
            id,
            title,
            description,
            image_url,
            price: self.price.as_ref().and_then(parse_price),
            rating: self
                .average_rating
                .and_then(Lenient::valid)
                .filter(|r| (0.0..=5.0).contains(r)),
            rating_count: self
                .rating_number
                .and_then(Lenient::valid)
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map(|n| n as u64),
            store: self.store.and_then(Lenient::valid),
            categories,
        })
    }
}

/// One line of the events file before normalization
#[derive(Debug, Clone, Deserialize)]
struct RawReviewEvent {
    #[serde(default)]
    parent_asin: Option<Lenient<String>>,
    #[serde(default)]
    asin: Option<Lenient<String>>,
    #[serde(default)]
    rating: Option<Lenient<f64>>,
    #[serde(default)]
    timestamp: Option<Lenient<i64>>,
}

// =============================================================================
// Field Resolution
// =============================================================================

/// Parse a price like `"$1,299.00"` into a number
pub fn parse_price(field: &PriceField) -> Option<f64> {
    match field {
        PriceField::Number(n) if n.is_finite() => Some(*n),
        PriceField::Text(text) => {
            let cleaned: String = text.chars().filter(|c| *c != '$' && *c != ',').collect();
            cleaned.trim().parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// First usable image, checked in order: high-res list, plain list, then
/// the `images` list whose entries are either strings or
/// `{hi_res, large, thumb}` objects.
fn first_image_url(
    high_res: Option<&Lenient<Vec<Value>>>,
    plain: Option<&Lenient<Vec<Value>>>,
    images: Option<&Lenient<Vec<Value>>>,
) -> Option<String> {
    let first_string = |field: Option<&Lenient<Vec<Value>>>| {
        field
            .and_then(Lenient::as_valid)
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    };

    first_string(high_res).or_else(|| first_string(plain)).or_else(|| {
        let first = images.and_then(Lenient::as_valid)?.first()?;
        match first {
            Value::String(url) if !url.is_empty() => Some(url.clone()),
            Value::Object(sizes) => ["hi_res", "large", "thumb"]
                .iter()
                .filter_map(|key| sizes.get(*key).and_then(Value::as_str))
                .find(|url| !url.is_empty())
                .map(str::to_string),
            _ => None,
        }
    })
}

fn resolve_description(
    description: Option<&DescriptionField>,
    features: Option<&Lenient<Vec<Value>>>,
) -> String {
    let text = match description {
        Some(DescriptionField::Text(text)) => text.clone(),
        Some(DescriptionField::List(items)) => items
            .iter()
            .take(2)
            .filter_map(value_to_text)
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    };
    if !text.is_empty() {
        return text;
    }

    features
        .and_then(Lenient::as_valid)
        .and_then(|list| list.first())
        .and_then(value_to_text)
        .unwrap_or_default()
}

/// Cut to [`MAX_DESCRIPTION_CHARS`] characters, ellipsis included
pub fn truncate_description(text: &str) -> String {
    truncate_chars(text, MAX_DESCRIPTION_CHARS - 3, MAX_DESCRIPTION_CHARS)
}

/// Keep `keep` chars plus `"..."` when `text` is longer than `limit` chars.
///
/// Counts `char`s, never bytes, so multi-byte text is never split.
pub fn truncate_chars(text: &str, keep: usize, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str("...");
    cut
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

// =============================================================================
// Line Parsers
// =============================================================================

/// Parse one metadata line.
///
/// `Ok(None)` means valid JSON without a product key.
pub fn parse_product_line(line: &str) -> serde_json::Result<Option<Product>> {
    let raw: RawProductRecord = serde_json::from_str(line)?;
    Ok(raw.into_product())
}

/// Parse one event line; `None` when malformed or missing a key/timestamp
pub fn parse_event_line(line: &str) -> Option<ReviewEvent> {
    let raw: RawReviewEvent = serde_json::from_str(line).ok()?;
    let product_id = [raw.parent_asin, raw.asin]
        .into_iter()
        .flatten()
        .filter_map(Lenient::valid)
        .find(|id| !id.is_empty())?;
    let timestamp_ms = raw.timestamp.and_then(Lenient::valid)?;

    Some(ReviewEvent {
        product_id,
        rating: raw.rating.and_then(Lenient::valid),
        timestamp_ms,
    })
}

/// Events read from a file, with the number of lines that were dropped
#[derive(Debug, Default)]
pub struct EventBatch {
    pub events: Vec<ReviewEvent>,
    pub skipped: usize,
}

/// Read at most `row_cap` non-empty lines of review events
pub fn read_events<R: BufRead>(reader: R, row_cap: usize) -> Result<EventBatch> {
    let mut batch = EventBatch::default();
    let mut rows = 0usize;

    for line in reader.lines() {
        if rows >= row_cap {
            break;
        }
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        rows += 1;

        match parse_event_line(line) {
            Some(event) => batch.events.push(event),
            None => batch.skipped += 1,
        }
    }

    if batch.skipped > 0 {
        tracing::warn!(skipped = batch.skipped, "Skipped malformed event lines");
    }
    Ok(batch)
}
