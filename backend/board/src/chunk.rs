//! # Chunking
//!
//! Packs ordered lines into as few messages as possible without splitting a line.
//!
//! A line joins the current batch when
//! `len(line) + len(batch) + len(separator) <= capacity`, where `len(batch)` is
//! the sum of its line lengths. Only one separator is charged per addition, so a
//! batch of `n` lines joined by the separator can run `n - 2` separators past
//! `capacity`. Lengths are counted in characters.
//!
//! A line longer than `capacity` still gets a batch of its own.

use crate::error::{BoardError, Result};

pub fn chunk_text<S, I>(fragments: I, capacity: usize, separator: &str) -> Result<Vec<Vec<S>>>
where
    S: AsRef<str>,
    I: IntoIterator<Item = S>,
{
    if capacity == 0 {
        return Err(BoardError::InvalidInput(
            "chunk capacity must be positive".to_string(),
        ));
    }

    let separator_len = separator.chars().count();

    let mut batches = Vec::new();
    let mut batch: Vec<S> = Vec::new();
    let mut batch_len = 0;

    for fragment in fragments {
        let len = fragment.as_ref().chars().count();

        if !batch.is_empty() && len + batch_len + separator_len > capacity {
            batches.push(std::mem::take(&mut batch));
            batch_len = 0;
        }

        batch_len += len;
        batch.push(fragment);
    }

    if !batch.is_empty() {
        batches.push(batch);
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk<'a>(fragments: &[&'a str], capacity: usize, separator: &str) -> Vec<Vec<&'a str>> {
        chunk_text(fragments.iter().copied(), capacity, separator).unwrap()
    }

    #[test]
    fn test_basic_packing() {
        assert_eq!(
            chunk(&["aaa", "bbb", "ccc"], 7, ""),
            vec![vec!["aaa", "bbb"], vec!["ccc"]]
        );
    }

    #[test]
    fn test_oversized_fragment_alone() {
        assert_eq!(chunk(&["xxxxxxxxxx"], 5, ""), vec![vec!["xxxxxxxxxx"]]);
        assert_eq!(
            chunk(&["ab", "xxxxxxxxxx", "cd"], 5, ""),
            vec![vec!["ab"], vec!["xxxxxxxxxx"], vec!["cd"]]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk(&[], 10, "\n").is_empty());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = chunk_text(vec!["a"], 0, "");
        assert!(matches!(result, Err(BoardError::InvalidInput(_))));
    }

    #[test]
    fn test_separator_counted_once_per_addition() {
        // "bb" needs 2 + 2 + 1 == 5, "cc" would need 2 + 4 + 1 == 7
        assert_eq!(
            chunk(&["aa", "bb", "cc"], 6, "\n"),
            vec![vec!["aa", "bb"], vec!["cc"]]
        );
        // the joined "aa\nbb\ncc" is 8 characters but only 7 are accounted for
        assert_eq!(
            chunk(&["aa", "bb", "cc"], 7, "\n"),
            vec![vec!["aa", "bb", "cc"]]
        );
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        assert_eq!(
            chunk(&["🥇🥇", "🥈🥈", "🥉"], 4, ""),
            vec![vec!["🥇🥇", "🥈🥈"], vec!["🥉"]]
        );
    }

    #[test]
    fn test_flatten_reproduces_input() {
        let lines: Vec<String> = (0..200).map(|i| "x".repeat(i % 37 + 1)).collect();

        for capacity in [1, 5, 36, 100, 1950] {
            let batches = chunk_text(lines.clone(), capacity, "\n").unwrap();
            let flat: Vec<String> = batches.into_iter().flatten().collect();

            assert_eq!(flat, lines);
        }
    }

    #[test]
    fn test_batches_respect_capacity() {
        let lines: Vec<String> = (0..120).map(|i| "y".repeat(i % 23 + 1)).collect();
        let capacity = 20;

        for batch in chunk_text(lines, capacity, "\n").unwrap() {
            if batch.len() == 1 {
                continue;
            }

            let total: usize = batch.iter().map(String::len).sum();
            assert!(total + 1 <= capacity);
        }
    }
}
