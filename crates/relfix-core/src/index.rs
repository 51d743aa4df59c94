//! Canonical relation names and their case-folded variants.

use log::warn;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::corrections::{Confidence, CorrectionPair, CorrectionSet};
use crate::schema::{Multiplicity, Schema};

/// The canonical relation a variant resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalEntry {
    /// Relation field name as declared in the schema.
    pub canonical: String,
    /// Model declaring the field.
    pub model: String,
    /// Model the field points at.
    pub target: String,
}

/// Two relations competing for the same variant. The first registration is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub variant: String,
    pub kept: String,
    pub rejected: String,
}

#[derive(Debug, Clone, Default)]
pub struct CanonicalIndex {
    variants: BTreeMap<String, CanonicalEntry>,
    canonical: BTreeSet<String>,
    collisions: Vec<Collision>,
}

impl CanonicalIndex {
    /// Build the index from every relation field of every model.
    ///
    /// Declared names are registered before any derived variant so a name the
    /// schema declares always resolves to itself.
    pub fn build(schema: &Schema) -> Self {
        let mut index = Self::default();

        let relations: Vec<_> = schema
            .models
            .iter()
            .flat_map(|model| {
                model.relations().map(move |field| {
                    let entry = CanonicalEntry {
                        canonical: field.name.clone(),
                        model: model.name.clone(),
                        target: field.target_type.clone().unwrap_or_default(),
                    };
                    (entry, field.multiplicity)
                })
            })
            .collect();

        for (entry, _) in &relations {
            index.canonical.insert(entry.canonical.clone());
            index.register(entry.canonical.clone(), entry);
        }

        for (entry, multiplicity) in &relations {
            for variant in variants(&entry.canonical, *multiplicity) {
                index.register(variant, entry);
            }
        }

        index
    }

    fn register(&mut self, variant: String, entry: &CanonicalEntry) {
        match self.variants.entry(variant) {
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
            }
            Entry::Occupied(slot) => {
                if slot.get().canonical != entry.canonical {
                    warn!(
                        "Variant '{}' maps to both '{}' ({}) and '{}' ({}); keeping '{}'",
                        slot.key(),
                        slot.get().canonical,
                        slot.get().model,
                        entry.canonical,
                        entry.model,
                        slot.get().canonical
                    );
                    self.collisions.push(Collision {
                        variant: slot.key().clone(),
                        kept: slot.get().canonical.clone(),
                        rejected: entry.canonical.clone(),
                    });
                }
            }
        }
    }

    pub fn lookup(&self, variant: &str) -> Option<&CanonicalEntry> {
        self.variants.get(variant)
    }

    pub fn is_canonical(&self, name: &str) -> bool {
        self.canonical.contains(name)
    }

    pub fn canonical_names(&self) -> &BTreeSet<String> {
        &self.canonical
    }

    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    /// Every (variant, entry) pair, including identity entries.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &CanonicalEntry)> {
        self.variants.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Registered variants that resolve to `canonical`, excluding itself.
    pub fn variants_of(&self, canonical: &str) -> Vec<&str> {
        self.variants
            .iter()
            .filter(|(variant, entry)| entry.canonical == canonical && *variant != canonical)
            .map(|(variant, _)| variant.as_str())
            .collect()
    }

    /// Correction pairs derived from the schema alone.
    ///
    /// A variant that is itself a declared relation name elsewhere is valid in
    /// that model's context and is never proposed as a correction.
    pub fn schema_corrections(&self) -> CorrectionSet {
        let pairs = self
            .variants
            .iter()
            .filter(|(variant, entry)| *variant != &entry.canonical)
            .filter(|(variant, _)| !self.is_canonical(variant))
            .map(|(variant, entry)| CorrectionPair {
                incorrect: variant.clone(),
                correct: entry.canonical.clone(),
                confidence: Confidence::Schema,
                occurrences: Vec::new(),
            });
        CorrectionSet::new(pairs, self)
    }
}

/// Case-folded lookup keys for a relation field name.
///
/// Every field gets its first-letter-lowercased and fully lowercased forms;
/// collection fields also get the plural of both.
pub fn variants(name: &str, multiplicity: Multiplicity) -> Vec<String> {
    let camel = lower_first(name);
    let lower = name.to_lowercase();

    let mut out = vec![camel.clone(), lower.clone()];
    if multiplicity == Multiplicity::Collection {
        out.push(pluralize(&camel));
        out.push(pluralize(&lower));
    }

    let mut seen = BTreeSet::new();
    out.retain(|v| v != name && seen.insert(v.clone()));
    out
}

/// True when `wrong` and `correct` differ only by case or pluralization.
pub fn is_spelling_variant(wrong: &str, correct: &str) -> bool {
    if wrong == correct {
        return false;
    }
    let wrong = wrong.to_lowercase();
    let correct = correct.to_lowercase();
    wrong == correct || singularize(&wrong) == singularize(&correct)
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pluralize(word: &str) -> String {
    if word.ends_with('s') {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    if word.ends_with("ch") || word.ends_with("sh") || word.ends_with('x') || word.ends_with('z') {
        return format!("{word}es");
    }
    format!("{word}s")
}

fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = word.strip_suffix("es") {
        if stem.ends_with("ch") || stem.ends_with("sh") || stem.ends_with('x') || stem.ends_with('z') {
            return stem.to_string();
        }
    }
    if let Some(stem) = word.strip_suffix('s') {
        if !stem.ends_with('s') {
            return stem.to_string();
        }
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    const SCHEMA: &str = r#"
model Club {
  id           String         @id
  Booking      Booking[]
  Court        Court[]
}

model Court {
  id      String @id
  Club    Club   @relation(fields: [clubId], references: [id])
}

model Booking {
  id           String         @id
  Club         Club           @relation(fields: [clubId], references: [id])
  Court        Court          @relation(fields: [courtId], references: [id])
  SplitPayment SplitPayment[]
}

model SplitPayment {
  id      String  @id
  Booking Booking @relation(fields: [bookingId], references: [id])
}

model TournamentMatch {
  id    String @id
  club  Club   @relation(fields: [clubId], references: [id])
}
"#;

    fn index() -> CanonicalIndex {
        CanonicalIndex::build(&parse_schema(SCHEMA))
    }

    #[test]
    fn registers_declared_names_and_variants() {
        let index = index();
        assert_eq!(index.lookup("Club").unwrap().canonical, "Club");
        assert_eq!(index.lookup("court").unwrap().canonical, "Court");
        assert_eq!(index.lookup("bookings").unwrap().canonical, "Booking");
        assert_eq!(index.lookup("splitPayment").unwrap().canonical, "SplitPayment");
        assert_eq!(index.lookup("splitPayments").unwrap().canonical, "SplitPayment");
        assert_eq!(index.lookup("splitpayment").unwrap().canonical, "SplitPayment");
        assert!(index.lookup("players").is_none());
    }

    #[test]
    fn single_relations_have_no_plural() {
        let index = index();
        // `Club` is only ever a single relation
        assert!(index.lookup("clubs").is_none());
    }

    #[test]
    fn canonical_names_belong_to_parsed_models() {
        let schema = parse_schema(SCHEMA);
        let index = CanonicalIndex::build(&schema);
        let models = schema.model_names();
        for (_, entry) in index.entries() {
            assert!(models.contains(entry.model.as_str()));
            assert!(models.contains(entry.target.as_str()));
            let model = schema.model(&entry.model).unwrap();
            assert!(model.relations().any(|f| f.name == entry.canonical));
        }
    }

    #[test]
    fn undeclared_targets_are_not_indexed() {
        let schema = parse_schema(
            "model Booking {\n  id String @id\n  Owner Owner @relation(fields: [ownerId])\n  Address Address?\n  Club Club\n}\nmodel Club {\n  id String @id\n}\n",
        );
        let index = CanonicalIndex::build(&schema);
        assert_eq!(
            index.canonical_names().iter().collect::<Vec<_>>(),
            vec!["Club"]
        );
        assert!(index.lookup("owner").is_none());
        assert!(index.lookup("address").is_none());

        let corrections = index.schema_corrections();
        let incorrect: Vec<_> = corrections.iter().map(|p| p.incorrect.as_str()).collect();
        assert_eq!(incorrect, vec!["club"]);
    }

    #[test]
    fn declared_name_wins_over_variant() {
        let index = index();
        // TournamentMatch declares `club`; it must resolve to itself.
        assert_eq!(index.lookup("club").unwrap().canonical, "club");
        assert!(index.collisions().iter().any(|c| c.variant == "club"
            && c.kept == "club"
            && c.rejected == "Club"));
    }

    #[test]
    fn schema_corrections_skip_declared_names() {
        let index = index();
        let set = index.schema_corrections();
        assert!(set.get("club").is_none());
        assert_eq!(set.get("court").unwrap().correct, "Court");
        assert_eq!(set.get("bookings").unwrap().correct, "Booking");
        assert!(set.iter().all(|p| index.is_canonical(&p.correct)));
    }

    #[test]
    fn variants_of_lists_lookup_keys() {
        let index = index();
        let mut variants = index.variants_of("Booking");
        variants.sort();
        assert_eq!(variants, vec!["booking", "bookings"]);
    }

    #[test]
    fn pluralization_rules() {
        assert_eq!(pluralize("tournamentMatch"), "tournamentMatches");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("players"), "players");
    }

    #[test]
    fn spelling_variants() {
        assert!(is_spelling_variant("club", "Club"));
        assert!(is_spelling_variant("bookings", "Booking"));
        assert!(is_spelling_variant("tournamentMatches", "TournamentMatch"));
        assert!(!is_spelling_variant("Club", "Club"));
        assert!(!is_spelling_variant("clubId", "Club"));
        assert!(!is_spelling_variant("court", "Club"));
    }
}
