use crate::models::{ClinicalAnswer, DocumentGroup, SearchHit};

/// Display-text limit for plain-text renderings.
pub const GENERIC_EXCERPT_CHARS: usize = 300;

/// Display-text limit for the richer structured rendering.
pub const DETAIL_EXCERPT_CHARS: usize = 400;

/// Truncates display text to `limit` characters with an ellipsis marker.
/// Display-only; the underlying hit is never touched.
pub fn excerpt(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}...")
}

/// Order-preserving first-seen-key aggregation by document id.
pub fn group_hits_by_document(results: &[SearchHit]) -> Vec<DocumentGroup> {
    let mut groups: Vec<DocumentGroup> = Vec::new();
    for hit in results {
        match groups
            .iter_mut()
            .find(|group| group.document_id == hit.chunk.document_id)
        {
            Some(group) => group.results.push(hit.clone()),
            None => groups.push(DocumentGroup {
                document_id: hit.chunk.document_id.clone(),
                results: vec![hit.clone()],
            }),
        }
    }
    groups
}

pub fn format_search_results(results: &[SearchHit], query: &str) -> String {
    if results.is_empty() {
        return format!("No results found for query: '{query}'");
    }

    let mut output = Vec::new();
    output.push(format!("Search Results for: '{query}'"));
    output.push("=".repeat(60));
    output.push(format!("Found {} relevant passages\n", results.len()));

    for (position, hit) in results.iter().enumerate() {
        output.push(format!(
            "{}. **{}** (Page {})",
            position + 1,
            hit.chunk.document_id,
            hit.chunk.page_number
        ));
        output.push(format!("   Section: {}", hit.chunk.section_title));
        output.push(format!("   Relevance: {:.3}", hit.relevance_score));
        output.push(format!("   Source: {}", hit.chunk.chunk_id));
        output.push(String::new());

        let text = hit.highlighted_text.as_deref().unwrap_or(&hit.chunk.text);
        output.push(format!("   {}", excerpt(text, GENERIC_EXCERPT_CHARS)));
        output.push(String::new());
    }

    output.join("\n")
}

pub fn format_clinical_answer(answer: &ClinicalAnswer) -> String {
    let mut output = Vec::new();
    output.push(format!("Clinical question: {}", answer.question));
    output.push(format!(
        "Medical terms identified: {}",
        if answer.medical_terms.is_empty() {
            "none".to_string()
        } else {
            answer.medical_terms.join(", ")
        }
    ));
    output.push(format!(
        "Total relevant passages found: {}\n",
        answer.total_results
    ));

    for group in &answer.results_by_document {
        output.push(format!("**{}**", group.document_id));
        for hit in &group.results {
            output.push(format!(
                "  - Page {} (relevance {:.3}): {}",
                hit.chunk.page_number,
                hit.relevance_score,
                excerpt(&hit.chunk.text, GENERIC_EXCERPT_CHARS)
            ));
        }
        output.push(String::new());
    }

    output.join("\n")
}
