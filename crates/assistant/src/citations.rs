//! Citations shown under an answer.

use std::collections::HashMap;

use coursemate_core::answer::Citation;
use coursemate_core::passage::RetrievedPassage;

/// One citation per distinct location, best score kept, most relevant first.
///
/// Locations are compared exactly, so two anchors on the same page are two
/// citations. Ids are assigned 1..n after sorting.
pub fn build_citations(passages: &[RetrievedPassage]) -> Vec<Citation> {
    let mut best: HashMap<&str, &RetrievedPassage> = HashMap::new();
    for passage in passages {
        best.entry(passage.location.as_str())
            .and_modify(|kept| {
                if passage.relevance_score > kept.relevance_score {
                    *kept = passage;
                }
            })
            .or_insert(passage);
    }

    let mut unique: Vec<&RetrievedPassage> = best.into_values().collect();
    unique.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.location.cmp(&b.location))
    });

    unique
        .into_iter()
        .enumerate()
        .map(|(i, p)| Citation {
            id: i as u32 + 1,
            title: p.source_label.clone(),
            url: p.location.clone(),
            section_title: p.section_title.clone(),
            relevance_score: p.relevance_score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(location: &str, score: f64) -> RetrievedPassage {
        RetrievedPassage::new("content", "Module", location, score)
    }

    #[test]
    fn duplicates_keep_highest_score() {
        let citations = build_citations(&[
            passage("module1/llms.html", 0.6),
            passage("module2/transformers.html", 0.7),
            passage("module1/llms.html", 0.9),
        ]);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].url, "module1/llms.html");
        assert!((citations[0].relevance_score - 0.9).abs() < 1e-6);
        assert_eq!(citations[0].id, 1);
        assert_eq!(citations[1].id, 2);
    }

    #[test]
    fn anchors_are_distinct() {
        let citations = build_citations(&[
            passage("module2/transformers.html#attention", 0.8),
            passage("module2/transformers.html#encoder", 0.75),
        ]);
        assert_eq!(citations.len(), 2);
    }

    #[test]
    fn section_title_carried() {
        let citations = build_citations(&[passage("m.html", 0.5).with_section("Attention")]);
        assert_eq!(citations[0].section_title.as_deref(), Some("Attention"));
        assert_eq!(citations[0].title, "Module");
    }

    #[test]
    fn empty_passages_no_citations() {
        assert!(build_citations(&[]).is_empty());
    }
}
