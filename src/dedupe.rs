/// Near-duplicate check by case-insensitive containment.
///
/// A candidate is rejected when it is contained in any recent text or any
/// recent text is contained in it. Reordered wording passes; that is the
/// intended strength of the heuristic.
pub fn is_unique<S: AsRef<str>>(candidate: &str, recent: &[S]) -> bool {
    let cand = candidate.to_lowercase();
    !recent.iter().any(|existing| {
        let existing = existing.as_ref().to_lowercase();
        existing.contains(&cand) || cand.contains(&existing)
    })
}

/// Start, middle and end 3-word phrases of an accepted text, used to steer
/// the next prompt away from the same wording. Short texts (4 words or fewer)
/// are kept whole.
pub fn extract_key_phrases(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let n = words.len();
    if n <= 4 {
        return vec![text.to_string()];
    }
    let mid = n / 2;
    vec![
        words[..3].join(" "),
        words[mid - 1..mid + 2].join(" "),
        words[n - 3..].join(" "),
    ]
}
