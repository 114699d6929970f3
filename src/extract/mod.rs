//! Declarative field extraction
//!
//! An [`Extractor`] is a named table of field pipelines. Each field locates
//! raw string matches on the page, runs every match through its input
//! processors, and reduces the survivors with its output processor.
//! Extraction is a pure function of the page and the extractor.

mod locator;
mod processors;
mod reduce;
mod value;

pub use locator::Locator;
pub use processors::{
    apply_chain, Processor, ProcessorError, ProcessorFactory, ProcessorFn, ProcessorRegistry,
};
pub use reduce::OutputProcessor;
pub use value::{FieldValue, Record, RecordView};

use crate::config::{ExtractorConfig, FieldConfig};
use crate::crawler::Page;
use crate::ConfigError;
use scraper::ElementRef;
use std::collections::BTreeMap;

/// Where a field's raw values come from
#[derive(Debug, Clone)]
enum FieldSource {
    /// A primary locator and fallbacks tried in order while nothing matches
    Located {
        primary: Locator,
        fallback: Vec<Locator>,
    },
    /// A constant value that ignores the page
    Constant(String),
}

/// One compiled field pipeline
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    source: FieldSource,
    processors: Vec<Processor>,
    output: OutputProcessor,
}

impl FieldSpec {
    /// Compiles a configured field against a processor registry
    pub fn compile(config: &FieldConfig, registry: &ProcessorRegistry) -> Result<Self, ConfigError> {
        let source = match (&config.locator, &config.value) {
            (Some(locator), None) => FieldSource::Located {
                primary: Locator::parse(locator)?,
                fallback: config
                    .fallback
                    .iter()
                    .map(|l| Locator::parse(l))
                    .collect::<Result<_, _>>()?,
            },
            (None, Some(value)) => FieldSource::Constant(value.clone()),
            _ => {
                return Err(ConfigError::Validation(format!(
                    "field '{}' needs exactly one of 'locator' or 'value'",
                    config.name
                )))
            }
        };

        let processors = config
            .processors
            .iter()
            .map(|p| registry.resolve(p))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            name: config.name.clone(),
            source,
            processors,
            output: OutputProcessor::parse(&config.output)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw matches under `root`, falling back while nothing matches
    pub fn raw_values(&self, root: ElementRef<'_>) -> Vec<String> {
        match &self.source {
            FieldSource::Constant(value) => vec![value.clone()],
            FieldSource::Located { primary, fallback } => {
                let mut values = primary.values(root);
                for locator in fallback {
                    if !values.is_empty() {
                        break;
                    }
                    values = locator.values(root);
                }
                values
            }
        }
    }

    /// Runs the pipeline over raw matches; `None` means absent
    pub fn evaluate(&self, raw: Vec<String>) -> Option<FieldValue> {
        if self.output == OutputProcessor::Presence {
            return Some(OutputProcessor::presence(raw.len()));
        }

        let survivors = raw
            .into_iter()
            .filter_map(|entry| {
                match apply_chain(&self.processors, FieldValue::Text(entry)) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::trace!("Field '{}' dropped an entry: {}", self.name, e);
                        None
                    }
                }
            })
            .collect();

        self.output.reduce(survivors)
    }
}

/// A named set of field pipelines, optionally scoped to repeated elements
#[derive(Debug, Clone)]
pub struct Extractor {
    name: String,
    scope: Option<Locator>,
    fields: Vec<FieldSpec>,
}

impl Extractor {
    pub fn compile(
        name: &str,
        config: &ExtractorConfig,
        registry: &ProcessorRegistry,
    ) -> Result<Self, ConfigError> {
        let scope = config.scope.as_deref().map(Locator::parse).transpose()?;
        let fields = config
            .fields
            .iter()
            .map(|f| FieldSpec::compile(f, registry))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            name: name.to_string(),
            scope,
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    /// Builds one record from the whole page
    ///
    /// Every declared field appears in the record, in declaration order.
    pub fn extract(&self, page: &Page) -> Record {
        self.extract_from(page.root(), page.url().as_str())
    }

    /// Builds the records a page yields
    ///
    /// Unscoped extractors yield exactly one record. Scoped extractors yield
    /// one record per scope match, with field locators evaluated relative to
    /// the matched element, and none when the scope matches nothing.
    pub fn extract_all(&self, page: &Page) -> Vec<Record> {
        match &self.scope {
            None => vec![self.extract(page)],
            Some(scope) => scope
                .elements(page.root())
                .into_iter()
                .map(|element| self.extract_from(element, page.url().as_str()))
                .collect(),
        }
    }

    fn extract_from(&self, root: ElementRef<'_>, source_url: &str) -> Record {
        let mut record = Record::new(self.name.as_str(), source_url);
        for field in &self.fields {
            let value = field.evaluate(field.raw_values(root));
            record.push(field.name.as_str(), value);
        }
        record
    }
}

/// All extractors of a crawl, by name
#[derive(Debug, Clone, Default)]
pub struct ExtractorSet {
    extractors: BTreeMap<String, Extractor>,
}

impl ExtractorSet {
    /// Compiles every configured extractor
    ///
    /// Any invalid locator, unknown processor or bad output processor fails
    /// the whole set, before the crawl starts.
    pub fn compile(
        configs: &BTreeMap<String, ExtractorConfig>,
        registry: &ProcessorRegistry,
    ) -> Result<Self, ConfigError> {
        let extractors = configs
            .iter()
            .map(|(name, config)| Ok((name.clone(), Extractor::compile(name, config, registry)?)))
            .collect::<Result<_, ConfigError>>()?;
        Ok(Self { extractors })
    }

    pub fn get(&self, name: &str) -> Option<&Extractor> {
        self.extractors.get(name)
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extractor> {
        self.extractors.values()
    }
}
