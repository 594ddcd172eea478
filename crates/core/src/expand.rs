use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct SynonymEntry {
    pub canonical: String,
    pub synonyms: Vec<String>,
}

impl SynonymEntry {
    fn new(canonical: &str, synonyms: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            synonyms: synonyms.iter().map(|synonym| synonym.to_string()).collect(),
        }
    }
}

/// Curated cardiology synonym table. Matching is plain substring lookup
/// against the lowercased query, with entries compared exactly as stored:
/// an acronym stored uppercase never fires, and a canonical term may match
/// inside a longer word. Both behaviors are part of the contract.
fn medical_synonyms() -> Vec<SynonymEntry> {
    vec![
        SynonymEntry::new(
            "hypertension",
            &[
                "high blood pressure",
                "elevated blood pressure",
                "arterial hypertension",
            ],
        ),
        SynonymEntry::new("myocardial infarction", &["heart attack", "MI", "acute MI"]),
        SynonymEntry::new("atrial fibrillation", &["AF", "AFib", "irregular heartbeat"]),
        SynonymEntry::new(
            "heart failure",
            &["HF", "cardiac failure", "congestive heart failure", "CHF"],
        ),
        SynonymEntry::new(
            "coronary artery disease",
            &["CAD", "coronary heart disease", "CHD"],
        ),
        SynonymEntry::new("diabetes", &["diabetes mellitus", "DM", "diabetic"]),
        SynonymEntry::new("stroke", &["cerebrovascular accident", "CVA"]),
        SynonymEntry::new(
            "anticoagulation",
            &["blood thinning", "anticoagulant therapy"],
        ),
        SynonymEntry::new("stent", &["percutaneous coronary intervention", "PCI"]),
        SynonymEntry::new("bypass", &["CABG", "coronary artery bypass graft"]),
    ]
}

pub struct QueryExpander {
    entries: Vec<SynonymEntry>,
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::with_table(medical_synonyms())
    }
}

impl QueryExpander {
    pub fn with_table(entries: Vec<SynonymEntry>) -> Self {
        Self { entries }
    }

    /// Appends synonyms of every matched canonical term, and the canonical
    /// term plus sibling synonyms of every matched synonym. The result is
    /// deduplicated with set semantics; term order is not significant.
    pub fn expand(&self, query: &str) -> String {
        let query_lower = query.to_lowercase();
        let mut terms: Vec<String> = vec![query.to_string()];

        for entry in &self.entries {
            if query_lower.contains(entry.canonical.as_str()) {
                terms.extend(entry.synonyms.iter().cloned());
            }
            for synonym in &entry.synonyms {
                if query_lower.contains(synonym.as_str()) {
                    terms.push(entry.canonical.clone());
                    terms.extend(
                        entry
                            .synonyms
                            .iter()
                            .filter(|sibling| *sibling != synonym)
                            .cloned(),
                    );
                    break;
                }
            }
        }

        let expanded = terms
            .into_iter()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect::<Vec<_>>()
            .join(" ");

        if expanded != query {
            tracing::debug!(from = query, to = %expanded, "query expanded");
        }
        expanded
    }

    /// Canonical terms recognized in a text, in table order.
    pub fn extract_terms(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut found = Vec::new();

        for entry in &self.entries {
            if lowered.contains(entry.canonical.as_str()) {
                found.push(entry.canonical.clone());
            }
        }
        for entry in &self.entries {
            for synonym in &entry.synonyms {
                if lowered.contains(synonym.as_str()) && !found.contains(&entry.canonical) {
                    found.push(entry.canonical.clone());
                }
            }
        }
        found
    }
}
