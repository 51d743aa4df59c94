//! Decides which occurrences of a correction candidate are relation references.
//!
//! Works on the token stream from [`crate::lexer`]. Two syntactic roles are
//! rewritable:
//!
//! - keys of object literals nested under a query keyword
//!   (`include: { club: true }`), and
//! - members of access chains rooted at a data record
//!   (`booking.court.name`).
//!
//! Model accessors on client handles (`prisma.club.findMany(...)`) look like
//! access chains and are reported as [`SpanKind::AccessorCall`] so they are
//! never touched.

use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use crate::corrections::CorrectionSet;
use crate::index::CanonicalIndex;
use crate::lexer::{LineIndex, Token, TokenKind, tokenize};

/// Model-accessor operations that identify `<handle>.<model>.<op>(` calls.
pub const PERSISTENCE_OPS: &[&str] = &[
    "findMany",
    "findFirst",
    "findFirstOrThrow",
    "findUnique",
    "findUniqueOrThrow",
    "create",
    "createMany",
    "createManyAndReturn",
    "update",
    "updateMany",
    "upsert",
    "delete",
    "deleteMany",
    "count",
    "aggregate",
    "groupBy",
];

pub const DEFAULT_RECORD_NAMES: &[&str] = &[
    "booking",
    "court",
    "club",
    "player",
    "payment",
    "user",
    "tournament",
    "notification",
    "splitPayment",
    "item",
    "row",
    "record",
];

pub const DEFAULT_CLIENT_HANDLES: &[&str] = &["prisma", "tx", "db"];

pub const DEFAULT_QUERY_KEYWORDS: &[&str] = &["include", "select", "where", "_count"];

/// Array methods whose callback parameter is an element of the receiver.
const ITERATOR_METHODS: &[&str] = &["map", "forEach", "filter", "find", "some", "every", "flatMap"];

/// How far a declaration's type annotation is scanned for its `=`.
const MAX_ANNOTATION_TOKENS: usize = 64;

/// Names that steer classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRules {
    /// Variables treated as data records without further evidence.
    pub record_names: BTreeSet<String>,
    /// Roots used to invoke persistence operations.
    pub client_handles: BTreeSet<String>,
    /// Keys whose object-literal value is a query construct.
    pub query_keywords: BTreeSet<String>,
}

impl Default for ContextRules {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            record_names: owned(DEFAULT_RECORD_NAMES),
            client_handles: owned(DEFAULT_CLIENT_HANDLES),
            query_keywords: owned(DEFAULT_QUERY_KEYWORDS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    QueryBlock,
    RelationAccess,
    AccessorCall,
    Unrelated,
}

impl SpanKind {
    pub fn is_rewritable(self) -> bool {
        matches!(self, SpanKind::QueryBlock | SpanKind::RelationAccess)
    }
}

/// Evidence behind a rewritable span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Certainty {
    /// Syntactic role or an inferred record binding.
    Certain,
    /// Only a configured record-name match.
    Heuristic,
}

/// One classified occurrence of a candidate identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedSpan {
    /// 1-based line.
    pub line: usize,
    /// 1-based byte column.
    pub column: usize,
    /// Byte range of the candidate token.
    pub range: Range<usize>,
    pub kind: SpanKind,
    pub candidate: String,
    pub certainty: Certainty,
}

pub struct Classifier<'a> {
    rules: &'a ContextRules,
    corrections: &'a CorrectionSet,
    index: &'a CanonicalIndex,
}

impl<'a> Classifier<'a> {
    pub fn new(
        rules: &'a ContextRules,
        corrections: &'a CorrectionSet,
        index: &'a CanonicalIndex,
    ) -> Self {
        Self {
            rules,
            corrections,
            index,
        }
    }

    pub fn corrections(&self) -> &CorrectionSet {
        self.corrections
    }

    /// Classify every candidate occurrence in `source`, in source order.
    pub fn classify(&self, source: &str) -> Vec<ClassifiedSpan> {
        let tokens = tokenize(source);
        let is_candidate = |t: &Token| t.is_ident() && self.corrections.contains(t.text);
        if !tokens.iter().any(is_candidate) {
            return Vec::new();
        }

        let lines = LineIndex::new(source);
        let scope = FileScope::analyze(&tokens, self.rules);
        let query_keys = self.query_keys(&tokens);

        let mut decided: BTreeMap<usize, (SpanKind, Certainty)> = BTreeMap::new();
        let mut spans = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            if !is_candidate(token) {
                continue;
            }

            let (kind, certainty) = if query_keys.contains(&i) {
                (SpanKind::QueryBlock, Certainty::Certain)
            } else {
                self.classify_member(&tokens, i, &scope, &decided)
            };
            decided.insert(i, (kind, certainty));

            let (line, col) = lines.line_col(token.start);
            spans.push(ClassifiedSpan {
                line,
                column: col + 1,
                range: token.start..token.end,
                kind,
                candidate: token.text.to_string(),
                certainty,
            });
        }

        debug!(
            "Classified {} candidate spans ({} handles, {} inferred records)",
            spans.len(),
            scope.handles.len(),
            scope.records.len()
        );
        spans
    }

    /// Token indices of identifiers in object-key position inside a query region.
    ///
    /// A `{` right after `<keyword> :` opens a region; every bracket nested in
    /// it belongs to the region until its matching closer.
    fn query_keys(&self, tokens: &[Token]) -> BTreeSet<usize> {
        let mut stack: Vec<(&str, bool)> = Vec::new();
        let mut keys = BTreeSet::new();

        for (i, token) in tokens.iter().enumerate() {
            match token.kind {
                TokenKind::Ident => {
                    let in_query_object = stack.last() == Some(&("{", true));
                    let after_separator =
                        i > 0 && (tokens[i - 1].is_punct("{") || tokens[i - 1].is_punct(","));
                    let before_colon = tokens.get(i + 1).is_some_and(|t| t.is_punct(":"));
                    if in_query_object && after_separator && before_colon {
                        keys.insert(i);
                    }
                }
                TokenKind::Punct => match token.text {
                    "{" | "[" | "(" => {
                        let inherited = stack.last().is_some_and(|frame| frame.1);
                        let opens = token.text == "{"
                            && i >= 2
                            && tokens[i - 1].is_punct(":")
                            && tokens[i - 2].is_ident()
                            && self.rules.query_keywords.contains(tokens[i - 2].text);
                        stack.push((token.text, inherited || opens));
                    }
                    "}" | "]" | ")" => {
                        stack.pop();
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        keys
    }

    fn classify_member(
        &self,
        tokens: &[Token],
        i: usize,
        scope: &FileScope,
        decided: &BTreeMap<usize, (SpanKind, Certainty)>,
    ) -> (SpanKind, Certainty) {
        let Some(pred) = predecessor(tokens, i) else {
            return (SpanKind::Unrelated, Certainty::Certain);
        };

        if scope.is_handle(tokens[pred].text) {
            return (SpanKind::AccessorCall, Certainty::Certain);
        }

        if !followed_by_member(tokens, i) {
            return (SpanKind::Unrelated, Certainty::Certain);
        }

        let qualified = match decided.get(&pred) {
            Some((SpanKind::RelationAccess, certainty)) => Some(*certainty),
            _ => scope.record_certainty(tokens[pred].text).or_else(|| {
                self.index
                    .is_canonical(tokens[pred].text)
                    .then_some(Certainty::Certain)
            }),
        };

        match qualified {
            Some(certainty) => (SpanKind::RelationAccess, certainty),
            None => (SpanKind::Unrelated, Certainty::Certain),
        }
    }
}

/// Per-file facts: client handles and variables bound to records.
struct FileScope<'r, 't> {
    rules: &'r ContextRules,
    handles: BTreeSet<&'t str>,
    records: BTreeSet<&'t str>,
}

impl<'r, 't> FileScope<'r, 't> {
    fn analyze(tokens: &[Token<'t>], rules: &'r ContextRules) -> Self {
        let mut scope = Self {
            rules,
            handles: BTreeSet::new(),
            records: BTreeSet::new(),
        };

        for window in tokens.windows(6) {
            if is_accessor_call(window) && !rules.record_names.contains(window[0].text) {
                scope.handles.insert(window[0].text);
            }
        }

        // Bindings can depend on each other (`for (const p of booking.payments)`
        // after `const booking = await ...`), so iterate to a fixpoint.
        loop {
            let known = scope.records.len();
            for i in 0..tokens.len() {
                let bound = scope
                    .query_result_binding(tokens, i)
                    .or_else(|| scope.loop_binding(tokens, i))
                    .or_else(|| scope.callback_binding(tokens, i));
                if let Some(name) = bound {
                    if !scope.handles.contains(name) {
                        scope.records.insert(name);
                    }
                }
            }
            if scope.records.len() == known {
                break;
            }
        }

        scope
    }

    fn is_handle(&self, name: &str) -> bool {
        self.handles.contains(name) || self.rules.client_handles.contains(name)
    }

    fn record_certainty(&self, name: &str) -> Option<Certainty> {
        if self.is_handle(name) {
            None
        } else if self.records.contains(name) {
            Some(Certainty::Certain)
        } else if self.rules.record_names.contains(name) {
            Some(Certainty::Heuristic)
        } else {
            None
        }
    }

    /// `const x [: T] = [await] <handle>.<model>.<op>(`
    fn query_result_binding(&self, tokens: &[Token<'t>], i: usize) -> Option<&'t str> {
        if !is_declaration_keyword(&tokens[i]) {
            return None;
        }
        let name = tokens.get(i + 1).filter(|t| t.is_ident())?;

        let mut j = i + 2;
        if tokens.get(j)?.is_punct(":") {
            let limit = (j + MAX_ANNOTATION_TOKENS).min(tokens.len());
            j = (j..limit).find(|&k| tokens[k].is_punct("=") || tokens[k].is_punct(";"))?;
        }
        if !tokens.get(j)?.is_punct("=") {
            return None;
        }
        j += 1;
        if tokens.get(j)?.is_keyword("await") {
            j += 1;
        }

        let call = tokens.get(j..j + 6)?;
        (is_accessor_call(call) && self.is_handle(call[0].text)).then_some(name.text)
    }

    /// `for (const x of <record>...)`
    fn loop_binding(&self, tokens: &[Token<'t>], i: usize) -> Option<&'t str> {
        let w = tokens.get(i..i + 6)?;
        let shaped = w[0].is_keyword("for")
            && w[1].is_punct("(")
            && is_declaration_keyword(&w[2])
            && w[3].is_ident()
            && w[4].is_keyword("of")
            && w[5].is_ident();
        (shaped && self.record_certainty(w[5].text).is_some()).then_some(w[3].text)
    }

    /// `<record>...map(x => ...)`, `<record>...forEach((x, i) => ...)`
    fn callback_binding(&self, tokens: &[Token<'t>], i: usize) -> Option<&'t str> {
        let method = &tokens[i];
        if !method.is_ident() || !ITERATOR_METHODS.contains(&method.text) || i < 2 {
            return None;
        }
        if !tokens[i - 1].is_member_dot() || !tokens.get(i + 1)?.is_punct("(") {
            return None;
        }

        let receiver_end = if tokens[i - 2].is_punct("!") { i.checked_sub(3)? } else { i - 2 };
        if !tokens[receiver_end].is_ident() {
            return None;
        }
        let root = chain_root(tokens, receiver_end);
        self.record_certainty(tokens[root].text)?;

        let mut k = i + 2;
        if tokens.get(k)?.is_keyword("async") {
            k += 1;
        }
        let first = tokens.get(k)?;
        if first.is_ident() && tokens.get(k + 1)?.is_punct("=>") {
            return Some(first.text);
        }
        if first.is_punct("(") {
            let param = tokens.get(k + 1).filter(|t| t.is_ident())?;
            let next = tokens.get(k + 2)?;
            if next.is_punct(",") || next.is_punct(")") || next.is_punct(":") {
                return Some(param.text);
            }
        }
        None
    }
}

fn is_declaration_keyword(token: &Token) -> bool {
    token.is_keyword("const") || token.is_keyword("let") || token.is_keyword("var")
}

/// `<handle> . <lowercase model> . <op> (`
fn is_accessor_call(w: &[Token]) -> bool {
    w.len() >= 6
        && w[0].is_ident()
        && w[1].is_member_dot()
        && w[2].is_ident()
        && w[2].text.starts_with(|c: char| c.is_ascii_lowercase())
        && w[3].is_member_dot()
        && w[4].is_ident()
        && PERSISTENCE_OPS.contains(&w[4].text)
        && w[5].is_punct("(")
}

/// Index of the segment before the member at `i`, looking through `!` and
/// index expressions (`bookings[0].club`).
fn predecessor(tokens: &[Token], i: usize) -> Option<usize> {
    if i < 2 || !tokens[i - 1].is_member_dot() {
        return None;
    }
    let mut j = i - 2;
    if tokens[j].is_punct("!") {
        j = j.checked_sub(1)?;
    }
    if tokens[j].is_punct("]") {
        j = matching_open(tokens, j)?.checked_sub(1)?;
    }
    tokens[j].is_ident().then_some(j)
}

fn matching_open(tokens: &[Token], close: usize) -> Option<usize> {
    let mut depth = 0usize;
    for j in (0..=close).rev() {
        if tokens[j].is_punct("]") {
            depth += 1;
        } else if tokens[j].is_punct("[") {
            depth -= 1;
            if depth == 0 {
                return Some(j);
            }
        }
    }
    None
}

fn followed_by_member(tokens: &[Token], i: usize) -> bool {
    let mut k = i + 1;
    if tokens.get(k).is_some_and(|t| t.is_punct("!")) {
        k += 1;
    }
    tokens.get(k).is_some_and(|t| t.is_member_dot())
}

/// First identifier of the dotted chain ending at `end`.
fn chain_root(tokens: &[Token], end: usize) -> usize {
    let mut k = end;
    while k >= 2 && tokens[k - 1].is_member_dot() {
        let mut prev = k - 2;
        if tokens[prev].is_punct("!") && prev > 0 {
            prev -= 1;
        }
        if !tokens[prev].is_ident() {
            break;
        }
        k = prev;
    }
    k
}
