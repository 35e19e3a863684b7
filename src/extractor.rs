use crate::error::{Error, Result};
use crate::fetcher::{endpoint, Fetcher};
use crate::metrics::StatsSnapshot;
use crate::record::{Batch, Record, TIMESTAMP_FIELD};
use crate::selector::{CssSelector, SelectorSpec};
use chrono::Local;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_LISTINGS_PATH: &str = "/cryptocurrencies";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionType {
    #[default]
    Text,
    Attribute(String),
    Html,
}

impl ExtractionType {
    /// Text is whitespace-collapsed, attributes and markup are only trimmed.
    fn read(&self, element: ElementRef) -> Option<String> {
        let value = match self {
            ExtractionType::Text => element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
            ExtractionType::Attribute(name) => element.value().attr(name)?.trim().to_string(),
            ExtractionType::Html => element.inner_html().trim().to_string(),
        };
        (!value.is_empty()).then_some(value)
    }
}

/// One way of locating a value inside a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    pub selector: SelectorSpec,
    #[serde(default)]
    pub extract: ExtractionType,
}

impl ExtractionRule {
    pub fn text(selector: impl Into<SelectorSpec>) -> Self {
        Self {
            selector: selector.into(),
            extract: ExtractionType::Text,
        }
    }

    pub fn attribute(selector: impl Into<SelectorSpec>, name: &str) -> Self {
        Self {
            selector: selector.into(),
            extract: ExtractionType::Attribute(name.to_string()),
        }
    }
}

/// A named field and its fallback chain, tried in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    pub chain: Vec<ExtractionRule>,
}

impl FieldRule {
    pub fn new(name: &str, required: bool, chain: Vec<ExtractionRule>) -> Self {
        Self {
            name: name.to_string(),
            required,
            chain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRules {
    pub card_selector: SelectorSpec,
    pub fields: Vec<FieldRule>,
}

impl Default for ListingRules {
    fn default() -> Self {
        let class = |name: &str| CssSelector::class(name);
        let data_field = |name: &str| CssSelector::Attribute {
            key: "data-field".to_string(),
            value: Some(name.to_string()),
        };

        Self {
            card_selector: class("crypto-card").into(),
            fields: vec![
                FieldRule::new(
                    "name",
                    true,
                    vec![
                        ExtractionRule::text(class("crypto-name")),
                        ExtractionRule::text(class("coin-name")),
                        ExtractionRule::text(data_field("name")),
                        ExtractionRule::attribute(CssSelector::Tag("img".into()), "alt"),
                    ],
                ),
                FieldRule::new(
                    "symbol",
                    false,
                    vec![
                        ExtractionRule::text(class("crypto-symbol")),
                        ExtractionRule::text(class("coin-symbol")),
                        ExtractionRule::text(data_field("symbol")),
                    ],
                ),
                FieldRule::new(
                    "price",
                    true,
                    vec![
                        ExtractionRule::text(class("crypto-price")),
                        ExtractionRule::text(class("price")),
                        ExtractionRule::text(data_field("price")),
                        ExtractionRule::attribute(
                            CssSelector::Attribute {
                                key: "data-price".into(),
                                value: None,
                            },
                            "data-price",
                        ),
                    ],
                ),
                FieldRule::new(
                    "24h_change",
                    false,
                    vec![
                        ExtractionRule::text(class("price-change")),
                        ExtractionRule::text(class("change-24h")),
                        ExtractionRule::text(data_field("change")),
                    ],
                ),
            ],
        }
    }
}

impl ListingRules {
    /// Names of all fields, in rule order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Structural problems that would make every extraction meaningless,
    /// including selectors that do not parse.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.fields.is_empty() {
            return Err("listing rules define no fields".into());
        }
        if !self.fields.iter().any(|f| f.required) {
            return Err("at least one field must be required".into());
        }
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(format!("field #{} has an empty name", i + 1));
            }
            if field.name == TIMESTAMP_FIELD {
                return Err(format!("'{}' is reserved", TIMESTAMP_FIELD));
            }
            if field.chain.is_empty() {
                return Err(format!("field '{}' has no selectors", field.name));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(format!("field '{}' is defined twice", field.name));
            }
        }
        self.compile().map(|_| ()).map_err(|e| e.to_string())
    }

    pub fn compile(&self) -> Result<ListingParser> {
        let fields = self
            .fields
            .iter()
            .map(|field| {
                let chain = field
                    .chain
                    .iter()
                    .map(|rule| {
                        Ok(CompiledRule {
                            selector: rule.selector.compile()?,
                            extract: rule.extract.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(CompiledField {
                    name: field.name.clone(),
                    required: field.required,
                    chain,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ListingParser {
            card_css: self.card_selector.to_string(),
            card: self.card_selector.compile()?,
            fields,
        })
    }
}

struct CompiledRule {
    selector: Selector,
    extract: ExtractionType,
}

struct CompiledField {
    name: String,
    required: bool,
    chain: Vec<CompiledRule>,
}

impl CompiledField {
    fn resolve(&self, card: ElementRef) -> Option<String> {
        self.chain.iter().find_map(|rule| {
            card.select(&rule.selector)
                .next()
                .and_then(|element| rule.extract.read(element))
        })
    }
}

/// [`ListingRules`] with every selector compiled.
pub struct ListingParser {
    card_css: String,
    card: Selector,
    fields: Vec<CompiledField>,
}

impl ListingParser {
    /// Parses `html` and extracts one record per card that yields every
    /// required field. Cards missing one are logged and skipped.
    pub fn parse_listings(&self, html: &str) -> Batch {
        let document = Html::parse_document(html);
        let cards: Vec<ElementRef> = document.select(&self.card).collect();

        if cards.is_empty() {
            log::warn!("Card selector '{}' matched nothing", self.card_css);
            return Vec::new();
        }
        log::debug!("Card selector '{}' found {} matches", self.card_css, cards.len());

        let mut batch = Vec::with_capacity(cards.len());
        for (index, card) in cards.iter().enumerate() {
            match self.extract_record(*card) {
                Ok(record) => batch.push(record),
                Err(e) => log::warn!("Error extracting card #{}: {}", index + 1, e),
            }
        }

        log::info!("Extracted {} of {} cards", batch.len(), cards.len());
        batch
    }

    pub fn extract_record(&self, card: ElementRef) -> Result<Record> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match field.resolve(card) {
                Some(value) => fields.push((field.name.clone(), value)),
                None if field.required => {
                    return Err(Error::Extraction(format!(
                        "required field '{}' not found",
                        field.name
                    )));
                }
                None => log::debug!("Optional field '{}' not found", field.name),
            }
        }
        Ok(Record::new(fields, Local::now()))
    }
}

/// Fetches the listings page through its [`Fetcher`] and turns it into a
/// [`Batch`]. Never fails outward: no page or no cards is an empty batch.
pub struct Extractor {
    fetcher: Fetcher,
    parser: ListingParser,
    listings_path: String,
}

impl Extractor {
    pub fn new(fetcher: Fetcher, rules: &ListingRules) -> Result<Self> {
        Ok(Self {
            fetcher,
            parser: rules.compile()?,
            listings_path: DEFAULT_LISTINGS_PATH.to_string(),
        })
    }

    pub fn with_listings_path(mut self, path: &str) -> Self {
        self.listings_path = path.to_string();
        self
    }

    pub fn fetcher_mut(&mut self) -> &mut Fetcher {
        &mut self.fetcher
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.fetcher.stats()
    }

    pub async fn extract_listings(&mut self, base_url: &Url) -> Batch {
        let url = match endpoint(base_url, &self.listings_path) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Cannot build listings URL from {}: {}", base_url, e);
                return Vec::new();
            }
        };

        log::info!("Visiting: {}", url);
        let delay = self.fetcher.default_delay();
        let Some(page) = self.fetcher.fetch(url.as_str(), delay).await.into_page() else {
            log::warn!("No response from {}; nothing to extract", url);
            return Vec::new();
        };

        log::debug!("HTML length: {} bytes", page.body.len());
        self.parser.parse_listings(&page.body)
    }
}
