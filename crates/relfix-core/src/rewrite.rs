//! Applies corrections to classified spans.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::classify::{Certainty, ClassifiedSpan, Classifier, SpanKind};
use crate::corrections::CorrectionSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Leave heuristic access rewrites for manual review instead of applying them.
    pub strict: bool,
}

/// A heuristic rewrite surfaced for manual review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewItem {
    pub line: usize,
    pub column: usize,
    pub incorrect: String,
    pub correct: String,
    /// Whether the rewrite was applied anyway.
    pub applied: bool,
    /// The source line, trimmed.
    pub context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    pub changed_lines: usize,
    pub query_block_fixes: usize,
    pub access_fixes: usize,
    /// Applied fixes per incorrect identifier.
    pub by_mapping: BTreeMap<String, usize>,
    pub review: Vec<ReviewItem>,
}

impl RewriteReport {
    pub fn total_fixes(&self) -> usize {
        self.query_block_fixes + self.access_fixes
    }

    pub fn merge(&mut self, other: &RewriteReport) {
        self.changed_lines += other.changed_lines;
        self.query_block_fixes += other.query_block_fixes;
        self.access_fixes += other.access_fixes;
        for (name, count) in &other.by_mapping {
            *self.by_mapping.entry(name.clone()).or_default() += count;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rewrite {
    pub text: String,
    pub report: RewriteReport,
}

impl Rewrite {
    pub fn changed(&self, original: &str) -> bool {
        self.text != original
    }
}

/// Replace the candidate token of every rewritable span with its canonical
/// name. Everything outside those byte ranges is copied unchanged.
pub fn rewrite(
    source: &str,
    spans: &[ClassifiedSpan],
    corrections: &CorrectionSet,
    options: RewriteOptions,
) -> Rewrite {
    let mut report = RewriteReport::default();
    let mut changed_lines = BTreeSet::new();
    let mut text = String::with_capacity(source.len());
    let mut cursor = 0;

    for span in spans {
        if !span.kind.is_rewritable() || span.range.start < cursor {
            continue;
        }
        let Some(pair) = corrections.get(&span.candidate) else {
            continue;
        };

        if span.certainty == Certainty::Heuristic {
            report.review.push(ReviewItem {
                line: span.line,
                column: span.column,
                incorrect: pair.incorrect.clone(),
                correct: pair.correct.clone(),
                applied: !options.strict,
                context: line_at(source, span.range.start).trim().to_string(),
            });
            if options.strict {
                continue;
            }
        }

        text.push_str(&source[cursor..span.range.start]);
        text.push_str(&pair.correct);
        cursor = span.range.end;

        changed_lines.insert(span.line);
        *report.by_mapping.entry(pair.incorrect.clone()).or_default() += 1;
        match span.kind {
            SpanKind::QueryBlock => report.query_block_fixes += 1,
            _ => report.access_fixes += 1,
        }
    }

    text.push_str(&source[cursor..]);
    report.changed_lines = changed_lines.len();
    Rewrite { text, report }
}

/// Classify and rewrite in one step.
pub fn canonicalize(source: &str, classifier: &Classifier, options: RewriteOptions) -> Rewrite {
    let spans = classifier.classify(source);
    rewrite(source, &spans, classifier.corrections(), options)
}

fn line_at(source: &str, offset: usize) -> &str {
    let start = source[..offset].rfind('\n').map_or(0, |p| p + 1);
    let end = source[offset..].find('\n').map_or(source.len(), |p| offset + p);
    &source[start..end]
}
