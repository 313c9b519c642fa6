//! Minimal JUnit XML document model shared by the XML report parsers.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::warn;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{CollectError, Result};
use crate::parsers::literal::parse_literal;
use crate::schema::Attributes;
use crate::timestamp::{offset_by, parse_timestamp, seconds};

/// An XML element with its attributes, child elements and concatenated text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// `<properties><property name=".." value=".."/></properties>` as an ordered map.
    /// The value falls back to the element text when the attribute is missing.
    pub fn properties(&self) -> IndexMap<String, String> {
        self.child("properties")
            .into_iter()
            .flat_map(|props| props.children_named("property"))
            .filter_map(|prop| {
                let name = prop.attr("name")?;
                let value = prop
                    .attr("value")
                    .map_or_else(|| prop.text.trim().to_string(), str::to_string);
                Some((name.to_string(), value))
            })
            .collect()
    }
}

pub fn read_document(path: &Path) -> Result<Element> {
    let content = fs::read_to_string(path)?;
    parse_document(&content)
}

/// Parses XML into its root element.
pub fn parse_document(content: &str) -> Result<Element> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => stack.push(start_element(&e)?),
            Event::Empty(e) => {
                let element = start_element(&e)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| CollectError::Parse("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.decode().map_err(|e| CollectError::Parse(e.to_string()))?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::GeneralRef(e) => {
                if let Some(current) = stack.last_mut() {
                    let raw = e.decode().map_err(|e| CollectError::Parse(e.to_string()))?;
                    current.text.push_str(&resolve_entity(&raw)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(CollectError::Parse(format!(
            "unclosed element <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }
    root.ok_or_else(|| CollectError::Parse("document has no root element".to_string()))
}

fn start_element(e: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let mut attributes = IndexMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| CollectError::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.insert(key, value);
    }
    Ok(Element {
        name,
        attributes,
        ..Element::default()
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn resolve_entity(raw: &str) -> Result<String> {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return Ok(resolved.to_string());
    }

    if let Some(rest) = raw.strip_prefix('#') {
        let code = match rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => rest.parse::<u32>().ok(),
        };
        return code
            .and_then(char::from_u32)
            .map(|ch| ch.to_string())
            .ok_or_else(|| CollectError::Parse(format!("invalid character reference &{raw};")));
    }

    Ok(format!("&{raw};"))
}

/// Reads a document for a `can_parse` check. Never fails.
pub fn peek_document(path: &Path) -> Option<Element> {
    if path.extension().and_then(|e| e.to_str()) != Some("xml") {
        return None;
    }
    read_document(path).ok()
}

/// Root `<testsuites>` whose first `<testsuite>` is named `pytest`.
pub fn is_pytest_report(root: &Element) -> bool {
    root.name == "testsuites"
        && root
            .child("testsuite")
            .is_some_and(|suite| suite.attr("name") == Some("pytest"))
}

/// A testcase needs both `name` and `classname`; runs killed mid-write leave
/// truncated elements without them.
pub fn is_valid_testcase(testcase: &Element) -> bool {
    testcase.attr("name").is_some() && testcase.attr("classname").is_some()
}

pub fn is_skipped(testcase: &Element) -> bool {
    testcase.child("skipped").is_some()
}

pub fn is_failed(testcase: &Element) -> bool {
    testcase.child("failure").is_some()
}

pub fn is_error(testcase: &Element) -> bool {
    testcase.child("error").is_some()
}

fn outcome_message(testcase: &Element, tag: &str) -> Option<String> {
    let element = testcase.child(tag)?;
    element
        .attr("message")
        .map(str::to_string)
        .or_else(|| Some(element.text.trim().to_string()).filter(|t| !t.is_empty()))
}

pub fn failure_message(testcase: &Element) -> Option<String> {
    outcome_message(testcase, "failure")
}

pub fn error_message(testcase: &Element) -> Option<String> {
    outcome_message(testcase, "error")
}

pub fn skipped_message(testcase: &Element) -> Option<String> {
    outcome_message(testcase, "skipped")
}

/// Message for pytest-flavoured reports: an explicit `error_message` property,
/// then error, then failure, then skip.
pub fn pytest_message(testcase: &Element, properties: &IndexMap<String, String>) -> Option<String> {
    properties
        .get("error_message")
        .cloned()
        .or_else(|| error_message(testcase))
        .or_else(|| failure_message(testcase))
        .or_else(|| skipped_message(testcase))
}

/// The `time` attribute in seconds, zero when missing or malformed.
pub fn duration_secs(element: &Element) -> f64 {
    element
        .attr("time")
        .and_then(|t| t.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Suite `timestamp` attribute, or `now` when absent or unparseable.
pub fn suite_timestamp(suite: &Element, now: DateTime<Utc>) -> DateTime<Utc> {
    suite
        .attr("timestamp")
        .and_then(parse_timestamp)
        .unwrap_or(now)
}

/// Start and end of a pytest testcase.
///
/// Recorded `start_timestamp`/`end_timestamp` properties are trusted only when
/// the test neither errored nor was skipped; otherwise the suite default is used.
pub fn pytest_times(
    testcase: &Element,
    properties: &IndexMap<String, String>,
    default_start: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let duration = seconds(duration_secs(testcase));

    let recorded_start = if is_error(testcase) || is_skipped(testcase) {
        None
    } else {
        properties
            .get("start_timestamp")
            .and_then(|ts| parse_timestamp(ts))
    };

    match recorded_start {
        Some(start) => {
            let end = properties
                .get("end_timestamp")
                .and_then(|ts| parse_timestamp(ts))
                .unwrap_or_else(|| offset_by(start, duration));
            (start, end)
        }
        None => (default_start, offset_by(default_start, duration)),
    }
}

/// `name` up to the first `[`, dropping pytest parametrization ids.
pub fn case_name(name: &str) -> &str {
    name.split('[').next().unwrap_or(name)
}

/// Dotted pytest classname as a source path: `tests.ops.test_add` -> `tests/ops/test_add.py`.
pub fn classname_to_filepath(classname: &str) -> String {
    format!("{}.py", classname.replace('.', "/"))
}

/// Decodes a literal-encoded mapping property. Anything else is logged and dropped.
pub fn literal_attributes(raw: &str, property: &str, source: &str) -> Option<Attributes> {
    match parse_literal(raw) {
        Ok(serde_json::Value::Object(map)) => Some(map.into_iter().collect()),
        Ok(other) => {
            warn!("Ignoring non-mapping `{property}` property in {source}: {other}");
            None
        }
        Err(e) => {
            warn!("Could not decode `{property}` property in {source}: {e}");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Writes `content` to `<dir>/<name>` and returns the path.
    pub fn write_file(dir: &std::path::Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub const PYTEST_REPORT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<testsuites>
  <testsuite name="pytest" errors="1" failures="1" skipped="1" tests="5" time="3.0" timestamp="2024-12-23T02:56:37.036690">
    <testcase classname="tests.ttnn.test_add" name="test_add[bf16]" time="0.5">
      <properties>
        <property name="start_timestamp" value="2024-12-23T03:00:00"/>
        <property name="end_timestamp" value="2024-12-23T03:00:02"/>
        <property name="tags" value="{'model': 'resnet', 'batch': 8}"/>
      </properties>
    </testcase>
    <testcase classname="models.demos.test_llama" name="test_demo" time="1.25">
      <failure message="assert 1 == 2">trace</failure>
    </testcase>
    <testcase classname="tt_eager.test_matmul" name="test_matmul" time="0.25">
      <properties>
        <property name="start_timestamp" value="2024-12-23T04:00:00"/>
      </properties>
      <error message="device hang">trace</error>
      <failure message="assert 0">trace</failure>
    </testcase>
    <testcase classname="tests.misc.test_skip" name="test_skip" time="0">
      <skipped message="not on this arch"/>
    </testcase>
    <testcase name="test_truncated"/>
  </testsuite>
</testsuites>
"#;
}
