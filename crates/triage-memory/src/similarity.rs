use std::collections::HashSet;

/// Results at or below this score are not returned by searches.
pub const SIMILARITY_THRESHOLD: f64 = 0.1;

/// Jaccard overlap of the lowercase whitespace-separated words.
pub fn text_similarity(query: &str, text: &str) -> f64 {
    let query = query.to_lowercase();
    let text = text.to_lowercase();
    let query_words: HashSet<&str> = query.split_whitespace().collect();
    let text_words: HashSet<&str> = text.split_whitespace().collect();

    let union = query_words.union(&text_words).count();
    if union == 0 {
        return 0.0;
    }
    query_words.intersection(&text_words).count() as f64 / union as f64
}
