//! Minimal XBRL instance reader.
//!
//! Only what revenue extraction needs is kept: contexts (period end and
//! dimensions), unit measures and facts with their raw text. Linkbases,
//! footnotes and schema references are ignored.

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

use crate::Result;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    pub id: String,
    /// `endDate` of a duration, or the `instant`
    pub period_end: Option<NaiveDate>,
    /// Carries the `NonConsolidatedMember` dimension
    pub non_consolidated: bool,
    /// Carries any other dimension (segments, components of equity, ...)
    pub other_dimensions: bool,
}

impl Context {
    pub fn is_current_period(&self) -> bool {
        self.id.starts_with("CurrentYear")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fact {
    /// Qualified name as written, e.g. `jppfs_cor:NetSales`
    pub name: String,
    pub context_ref: String,
    pub unit_ref: Option<String>,
    pub scale: Option<i32>,
    pub is_nil: bool,
    pub value: String,
}

impl Fact {
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    /// A prefixed tag must match the qualified name; an unprefixed one the local name.
    pub fn matches(&self, tag: &str) -> bool {
        if tag.contains(':') {
            self.name == tag
        } else {
            self.local_name() == tag
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggedReport {
    pub source: String,
    pub contexts: HashMap<String, Context>,
    /// Unit id to measure without namespace prefix (`iso4217:JPY` becomes `JPY`)
    pub units: HashMap<String, String>,
    pub facts: Vec<Fact>,
}

fn attribute(element: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key || attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn local_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn start_fact(element: &BytesStart, context_ref: String) -> Result<Fact> {
    Ok(Fact {
        name: String::from_utf8_lossy(element.name().as_ref()).into_owned(),
        context_ref,
        unit_ref: attribute(element, b"unitRef")?,
        scale: attribute(element, b"scale")?.and_then(|s| s.trim().parse().ok()),
        is_nil: attribute(element, b"nil")?.is_some_and(|v| v.trim() == "true"),
        value: String::new(),
    })
}

impl TaggedReport {
    pub fn parse(xml: &str, source: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut report = TaggedReport {
            source: source.to_string(),
            ..Default::default()
        };
        let mut context: Option<Context> = None;
        let mut unit: Option<String> = None;
        let mut fact: Option<Fact> = None;
        // Markup nested inside a fact value
        let mut fact_depth = 0usize;
        let mut text = String::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    if fact.is_some() {
                        fact_depth += 1;
                        continue;
                    }
                    text.clear();
                    match local_name(&e).as_str() {
                        "context" => {
                            context = Some(Context {
                                id: attribute(&e, b"id")?.unwrap_or_default(),
                                ..Default::default()
                            })
                        }
                        "unit" => unit = attribute(&e, b"id")?,
                        _ => {
                            if let Some(context_ref) = attribute(&e, b"contextRef")? {
                                fact = Some(start_fact(&e, context_ref)?);
                            }
                        }
                    }
                }
                Event::Empty(e) => {
                    if fact.is_none() {
                        if let Some(context_ref) = attribute(&e, b"contextRef")? {
                            report.facts.push(start_fact(&e, context_ref)?);
                        }
                    }
                }
                Event::Text(t) => text.push_str(&t.unescape()?),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
                Event::End(e) => {
                    if fact.is_some() {
                        if fact_depth > 0 {
                            fact_depth -= 1;
                            continue;
                        }
                        if let Some(mut finished) = fact.take() {
                            finished.value = text.trim().to_string();
                            report.facts.push(finished);
                        }
                        text.clear();
                        continue;
                    }

                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    match name.as_str() {
                        "endDate" | "instant" => {
                            if let Some(ctx) = context.as_mut() {
                                ctx.period_end =
                                    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok();
                            }
                        }
                        "explicitMember" | "typedMember" => {
                            if let Some(ctx) = context.as_mut() {
                                if text.contains("NonConsolidatedMember") {
                                    ctx.non_consolidated = true;
                                } else {
                                    ctx.other_dimensions = true;
                                }
                            }
                        }
                        "context" => {
                            if let Some(ctx) = context.take() {
                                report.contexts.insert(ctx.id.clone(), ctx);
                            }
                        }
                        "measure" => {
                            if let Some(id) = &unit {
                                let measure = text.trim();
                                let measure = measure.rsplit(':').next().unwrap_or(measure);
                                report
                                    .units
                                    .entry(id.clone())
                                    .or_insert_with(|| measure.to_string());
                            }
                        }
                        "unit" => unit = None,
                        _ => {}
                    }
                    text.clear();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        tracing::debug!(
            source,
            contexts = report.contexts.len(),
            facts = report.facts.len(),
            "parsed tagged report"
        );
        Ok(report)
    }

    /// Text of the first non-nil fact matching `tag`.
    pub fn value_of(&self, tag: &str) -> Option<&str> {
        self.facts
            .iter()
            .find(|f| f.matches(tag) && !f.is_nil && !f.value.is_empty())
            .map(|f| f.value.as_str())
    }

    pub fn context(&self, id: &str) -> Option<&Context> {
        self.contexts.get(id)
    }
}
