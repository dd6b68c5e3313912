use super::lines::{ClassifiedLine, LineKind};
use super::record::HistoryEntry;

/// Whether the pass is currently inside the `Summary:` span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySpan {
    OutsideSummary,
    InsideSummary,
}

/// Span transition for one classified line. Only the first marker opens a span;
/// only a history entry closes it.
pub fn transition(span: SummarySpan, kind: &LineKind, marker_seen: bool) -> SummarySpan {
    match (span, kind) {
        (SummarySpan::OutsideSummary, LineKind::SummaryMarker(_)) if !marker_seen => {
            SummarySpan::InsideSummary
        }
        (SummarySpan::InsideSummary, LineKind::HistoryEntry { .. }) => SummarySpan::OutsideSummary,
        (span, _) => span,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sections {
    pub title_line: Option<String>,
    pub summary_title: Option<String>,
    pub summary_lines: Vec<String>,
    pub headline_lines: Vec<String>,
    pub history: Vec<HistoryEntry>,
}

impl Sections {
    pub fn summary_text(&self) -> String {
        self.summary_lines.join(" ")
    }

    pub fn headline(&self) -> Option<String> {
        if self.headline_lines.is_empty() {
            None
        } else {
            Some(self.headline_lines.join(" "))
        }
    }
}

/// Left-to-right fold over classified lines.
pub fn accumulate(lines: &[ClassifiedLine]) -> Sections {
    let mut acc = Accumulator::new();
    for line in lines {
        acc.push(line);
    }
    acc.finish()
}

struct Accumulator {
    span: SummarySpan,
    marker_seen: bool,
    // All-caps run directly after the marker; closed by the first other line.
    headline_open: bool,
    out: Sections,
}

impl Accumulator {
    fn new() -> Self {
        Accumulator {
            span: SummarySpan::OutsideSummary,
            marker_seen: false,
            headline_open: false,
            out: Sections::default(),
        }
    }

    fn push(&mut self, line: &ClassifiedLine) {
        if line.kind == LineKind::Title && self.out.title_line.is_none() {
            self.out.title_line = Some(line.content.trim().to_string());
        }

        let next = transition(self.span, &line.kind, self.marker_seen);
        match (self.span, next) {
            (SummarySpan::OutsideSummary, SummarySpan::InsideSummary) => {
                self.marker_seen = true;
                self.headline_open = true;
                self.out.summary_lines.clear();
                if let LineKind::SummaryMarker(rest) = &line.kind {
                    self.out.summary_title = Some(rest.clone()).filter(|t| !t.is_empty());
                }
            }
            (SummarySpan::InsideSummary, SummarySpan::InsideSummary) => {
                self.append_summary(line);
            }
            _ => self.headline_open = false,
        }
        self.span = next;

        if let LineKind::HistoryEntry {
            date_text,
            chamber,
            action,
        } = &line.kind
        {
            self.out
                .history
                .push(HistoryEntry::new(date_text, chamber, action));
        }
    }

    fn append_summary(&mut self, line: &ClassifiedLine) {
        let text = line.content.trim();
        if self.headline_open {
            if line.kind == LineKind::UppercaseBlock {
                self.out.headline_lines.push(text.to_string());
            } else {
                self.headline_open = false;
            }
        }
        self.out.summary_lines.push(text.to_string());
    }

    fn finish(self) -> Sections {
        self.out
    }
}

// ── Tests ──
