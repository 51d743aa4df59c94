//! Confirms correction pairs against compiler diagnostics.
//!
//! Diagnostic lines look like
//! `app/page.tsx(12,7): error TS2551: Property 'club' does not exist on type '...'. Did you mean 'Club'?`.
//! A suggestion is only trusted when it names a relation declared in the
//! schema; the compiler happily suggests unrelated symbols too.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::corrections::{Confidence, CorrectionPair, CorrectionSet, Location};
use crate::index::{CanonicalIndex, is_spelling_variant};

static DIAGNOSTIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<file>.+?)\((?P<line>\d+),(?P<col>\d+)\): error (?P<code>[A-Z]+\d+): (?P<message>.*)$")
        .unwrap()
});

static SUGGESTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"'(?P<wrong>[A-Za-z_$][\w$]*)' does not exist.*?[Dd]id you mean(?: to write)? '(?P<correct>[A-Za-z_$][\w$]*)'",
    )
    .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Location,
    pub code: String,
    pub message: String,
}

/// Parse one compiler output line; anything not shaped like a diagnostic is `None`.
pub fn parse_diagnostic(line: &str) -> Option<Diagnostic> {
    let caps = DIAGNOSTIC_RE.captures(line.trim_end())?;
    Some(Diagnostic {
        location: Location {
            file: caps["file"].trim().to_string(),
            line: caps["line"].parse().ok()?,
            column: caps["col"].parse().ok()?,
        },
        code: caps["code"].to_string(),
        message: caps["message"].to_string(),
    })
}

/// `(wrong, suggested)` from a "does not exist ... did you mean" message.
pub fn extract_suggestion(message: &str) -> Option<(&str, &str)> {
    let caps = SUGGESTION_RE.captures(message)?;
    let wrong = caps.name("wrong")?.as_str();
    let correct = caps.name("correct")?.as_str();
    Some((wrong, correct))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    /// Diagnostics carrying one of the examined codes.
    pub total: usize,
    pub by_code: BTreeMap<String, usize>,
    /// Diagnostics with a "did you mean" suggestion.
    pub matched: usize,
    /// Suggestions confirmed against the schema.
    pub confirmed: usize,
    pub discarded: usize,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub corrections: CorrectionSet,
    pub stats: ReconcileStats,
}

impl Reconciliation {
    /// Files with the most confirmed occurrences.
    pub fn top_files(&self, limit: usize) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for pair in self.corrections.iter() {
            for loc in &pair.occurrences {
                *counts.entry(loc.file.as_str()).or_default() += 1;
            }
        }
        let mut files: Vec<_> = counts.into_iter().map(|(f, n)| (f.to_string(), n)).collect();
        files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        files.truncate(limit);
        files
    }
}

pub struct DiagnosticReconciler<'a> {
    index: &'a CanonicalIndex,
    codes: BTreeSet<String>,
}

impl<'a> DiagnosticReconciler<'a> {
    pub fn new<S: AsRef<str>>(index: &'a CanonicalIndex, codes: &[S]) -> Self {
        Self {
            index,
            codes: codes.iter().map(|c| c.as_ref().to_string()).collect(),
        }
    }

    pub fn reconcile<'l>(&self, lines: impl IntoIterator<Item = &'l str>) -> Reconciliation {
        let mut stats = ReconcileStats::default();
        let mut pairs = Vec::new();

        for diagnostic in lines.into_iter().filter_map(parse_diagnostic) {
            if !self.codes.contains(&diagnostic.code) {
                continue;
            }
            stats.total += 1;
            *stats.by_code.entry(diagnostic.code.clone()).or_default() += 1;

            let Some((wrong, correct)) = extract_suggestion(&diagnostic.message) else {
                continue;
            };
            stats.matched += 1;

            if !self.index.is_canonical(correct) || !is_spelling_variant(wrong, correct) {
                log::debug!(
                    "Discarding suggestion '{wrong}' -> '{correct}' at {}:{}",
                    diagnostic.location.file,
                    diagnostic.location.line
                );
                stats.discarded += 1;
                continue;
            }

            stats.confirmed += 1;
            pairs.push(CorrectionPair {
                incorrect: wrong.to_string(),
                correct: correct.to_string(),
                confidence: Confidence::Confirmed,
                occurrences: vec![diagnostic.location],
            });
        }

        Reconciliation {
            corrections: CorrectionSet::new(pairs, self.index),
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    const OUTPUT: &str = "\
app/bookings/page.tsx(12,23): error TS2551: Property 'club' does not exist on type 'BookingWithRelations'. Did you mean 'Club'?
app/bookings/page.tsx(30,9): error TS2561: Object literal may only specify known properties, but 'court' does not exist in type 'BookingInclude<DefaultArgs>'. Did you mean to write 'Court'?
lib/stats.ts(4,5): error TS2551: Property 'club' does not exist on type 'Booking'. Did you mean 'Club'?
lib/stats.ts(8,1): error TS2551: Property 'lenght' does not exist on type 'string[]'. Did you mean 'length'?
lib/stats.ts(9,1): error TS2339: Property 'foo' does not exist on type 'Bar'.
lib/stats.ts(10,1): error TS2322: Type 'string' is not assignable to type 'number'.
Found 6 errors in 2 files.
";

    fn index() -> CanonicalIndex {
        CanonicalIndex::build(&parse_schema(
            "model Booking {\n  Club Club @relation(fields: [clubId])\n  Court Court @relation(fields: [courtId])\n}\nmodel Club {\n  id String\n}\nmodel Court {\n  id String\n}\n",
        ))
    }

    #[test]
    fn parses_diagnostic_lines() {
        let d = parse_diagnostic(
            "app/x.tsx(3,14): error TS2551: Property 'court' does not exist on type 'A'. Did you mean 'Court'?",
        )
        .unwrap();
        assert_eq!(d.location.file, "app/x.tsx");
        assert_eq!((d.location.line, d.location.column), (3, 14));
        assert_eq!(d.code, "TS2551");
        assert_eq!(extract_suggestion(&d.message), Some(("court", "Court")));

        assert!(parse_diagnostic("Found 6 errors in 2 files.").is_none());
    }

    #[test]
    fn confirms_only_schema_relations() {
        let index = index();
        let reconciler = DiagnosticReconciler::new(&index, &["TS2551", "TS2561"]);
        let result = reconciler.reconcile(OUTPUT.lines());

        let club = result.corrections.get("club").unwrap();
        assert_eq!(club.correct, "Club");
        assert_eq!(club.confidence, Confidence::Confirmed);
        assert_eq!(club.occurrences.len(), 2);

        assert_eq!(result.corrections.get("court").unwrap().correct, "Court");
        assert!(result.corrections.get("lenght").is_none());
        assert_eq!(result.corrections.len(), 2);
    }

    #[test]
    fn collects_stats() {
        let index = index();
        let reconciler = DiagnosticReconciler::new(&index, &["TS2551", "TS2561"]);
        let stats = reconciler.reconcile(OUTPUT.lines()).stats;

        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_code.get("TS2551"), Some(&3));
        assert_eq!(stats.by_code.get("TS2561"), Some(&1));
        assert_eq!(stats.matched, 4);
        assert_eq!(stats.confirmed, 3);
        assert_eq!(stats.discarded, 1);
    }

    #[test]
    fn ranks_affected_files() {
        let index = index();
        let reconciler = DiagnosticReconciler::new(&index, &["TS2551", "TS2561"]);
        let top = reconciler.reconcile(OUTPUT.lines()).top_files(10);
        assert_eq!(
            top,
            vec![
                ("app/bookings/page.tsx".to_string(), 2),
                ("lib/stats.ts".to_string(), 1)
            ]
        );
    }

    #[test]
    fn ignores_unconfigured_codes() {
        let index = index();
        let reconciler = DiagnosticReconciler::new(&index, &["TS2561"]);
        let result = reconciler.reconcile(OUTPUT.lines());
        assert!(result.corrections.get("club").is_none());
        assert!(result.corrections.get("court").is_some());
    }
}
