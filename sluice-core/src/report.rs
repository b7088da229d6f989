//! The debug/reporting sink. Passes and the simulator hand structured
//! entries to a pluggable sink; the default forwards to the `log`
//! facade so advisories show up alongside everything else.

use crate::ir::group::GroupId;
use crate::ir::node::NodeId;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub enum RichContent {
    Text(String),
    Node(NodeId),
    Group(GroupId),
    Subnet(Vec<NodeId>),
}

#[derive(Clone, Debug)]
pub struct ReportEntry {
    pub severity: Severity,
    pub source: &'static str,
    pub anchor: Option<GroupId>,
    pub content: Vec<RichContent>,
}

impl ReportEntry {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                RichContent::Text(t) => t.clone(),
                RichContent::Node(n) => format!("{n:?}"),
                RichContent::Group(g) => format!("{g:?}"),
                RichContent::Subnet(s) => format!("subnet[{}]", s.len()),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub trait ReportSink {
    fn submit(&mut self, entry: ReportEntry);
}

/// Default sink: routes entries to `log` at the matching level.
#[derive(Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn submit(&mut self, entry: ReportEntry) {
        let text = entry.text();
        match entry.severity {
            Severity::Info => log::info!(target: "sluice", "[{}] {}", entry.source, text),
            Severity::Warning => log::warn!(target: "sluice", "[{}] {}", entry.source, text),
            Severity::Error => log::error!(target: "sluice", "[{}] {}", entry.source, text),
        }
    }
}

/// A sink that additionally retains entries, used by tests and report
/// generators.
#[derive(Default)]
pub struct RecordingSink {
    pub entries: Vec<ReportEntry>,
}

impl ReportSink for RecordingSink {
    fn submit(&mut self, entry: ReportEntry) {
        LogSink.submit(entry.clone());
        self.entries.push(entry);
    }
}

pub struct Reporter {
    sink: Box<dyn ReportSink>,
}

impl Default for Reporter {
    fn default() -> Self {
        Reporter {
            sink: Box::new(LogSink),
        }
    }
}

impl Reporter {
    pub fn new(sink: Box<dyn ReportSink>) -> Self {
        Reporter { sink }
    }

    pub fn submit(&mut self, entry: ReportEntry) {
        self.sink.submit(entry);
    }

    pub fn warning(&mut self, source: &'static str, text: impl Into<String>) {
        self.submit(ReportEntry {
            severity: Severity::Warning,
            source,
            anchor: None,
            content: vec![RichContent::Text(text.into())],
        });
    }

    pub fn info(&mut self, source: &'static str, text: impl Into<String>) {
        self.submit(ReportEntry {
            severity: Severity::Info,
            source,
            anchor: None,
            content: vec![RichContent::Text(text.into())],
        });
    }
}
