//! Small string-similarity helpers used by the gazetteer and the hotel
//! matcher. Scores are in [0.0, 1.0].

/// Normalized edit similarity: 1 - levenshtein(a, b) / max(len).
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let max_len = a.len().max(b.len());
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings() {
        assert_eq!(edit_similarity("paris", "paris"), 1.0);
    }

    #[test]
    fn test_one_edit() {
        let score = edit_similarity("paris", "pars");
        assert!(score > 0.7 && score < 1.0);
    }

    #[test]
    fn test_disjoint_strings() {
        assert!(edit_similarity("abc", "xyz") < 0.01);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(edit_similarity("", ""), 1.0);
        assert_eq!(edit_similarity("a", ""), 0.0);
    }
}
