use std::{
    cmp::min,
    ops::{Index, IndexMut},
};

#[derive(Debug, Clone)]
struct Matrix<T: Clone> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Clone> Matrix<T> {
    pub fn new(rows: usize, cols: usize, fill: T) -> Self {
        Self {
            data: vec![fill; rows * cols],
            rows,
            cols,
        }
    }

    pub fn get(&self, row: usize, col: usize) -> &T {
        &self.data[row * self.cols + col]
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut T {
        &mut self.data[row * self.cols + col]
    }

    #[allow(dead_code)]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[allow(dead_code)]
    pub fn cols(&self) -> usize {
        self.cols
    }
}

impl<T: Clone> Index<(usize, usize)> for Matrix<T> {
    type Output = T;
    fn index(&self, (row, col): (usize, usize)) -> &T {
        self.get(row, col)
    }
}

impl<T: Clone> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        self.get_mut(row, col)
    }
}

fn min3<T: Ord>(v1: T, v2: T, v3: T) -> T {
    min(v1, min(v2, v3))
}

pub fn edit_distance(word1: &str, word2: &str) -> usize {
    let mut cache =
        Matrix::<usize>::new(word1.len() + 1, word2.len() + 1, usize::MAX);

    for j in 0..=word1.len() {
        cache[(j, word2.len())] = word1.len() - j;
    }
    for i in 0..=word2.len() {
        cache[(word1.len(), i)] = word2.len() - i;
    }

    for i in (0..word1.len()).rev() {
        for j in (0..word2.len()).rev() {
            if word1.chars().nth(i) == word2.chars().nth(j) {
                cache[(i, j)] = cache[(i + 1, j + 1)];
            } else {
                cache[(i, j)] = 1 + min3(
                    cache[(i + 1, j)],
                    cache[(i, j + 1)],
                    cache[(i + 1, j + 1)],
                );
            }
        }
    }

    cache[(0, 0)]
}

pub fn edit_distance_shorten(word1: &str, word2: &str) -> usize {
    if word1.len() <= word2.len() {
        edit_distance(word1, &word2[..word1.len()])
    } else {
        edit_distance(&word1[..word2.len()], word2)
    }
}

/// Normalized similarity in `[0.0, 1.0]`, `1.0` meaning identical. The
/// building block [`token_set_ratio`] scores individual token pairs with.
pub fn similarity_ratio(word1: &str, word2: &str) -> f64 {
    let longest = word1.len().max(word2.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - (edit_distance(word1, word2) as f64 / longest as f64)
}

/// Token-set similarity in `[0.0, 1.0]`: splits both strings on whitespace,
/// then greedily pairs each token in `a` with its best-scoring remaining
/// token in `b` (by [`similarity_ratio`]), summing the matched scores over
/// the larger token count. Unlike running `similarity_ratio` over the whole
/// string, token order doesn't matter — "Euston London" and "London Euston"
/// score identically — and a per-token typo only costs that one token's
/// share of the score rather than smearing across the whole comparison.
/// Used by the station resolver's fuzzy-match tier to score a candidate
/// name/alias against a query when no exact or prefix match exists.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: Vec<&str> = a.split_whitespace().collect();
    let mut tokens_b: Vec<&str> = b.split_whitespace().collect();

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let token_count = tokens_a.len().max(tokens_b.len());
    let mut matched_total = 0.0;
    for token_a in &tokens_a {
        if tokens_b.is_empty() {
            break;
        }
        let best_index = tokens_b
            .iter()
            .enumerate()
            .map(|(index, token_b)| (index, similarity_ratio(token_a, token_b)))
            .fold((0, -1.0_f64), |best, candidate| if candidate.1 > best.1 { candidate } else { best })
            .0;
        matched_total += similarity_ratio(token_a, tokens_b[best_index]);
        tokens_b.remove(best_index);
    }

    matched_total / token_count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_set_ratio_ignores_word_order() {
        assert_eq!(token_set_ratio("euston london", "london euston"), 1.0);
    }

    #[test]
    fn token_set_ratio_tolerates_a_single_token_typo() {
        let ratio = token_set_ratio("londn euston", "london euston");
        assert!(ratio > 0.85 && ratio < 1.0);
    }

    #[test]
    fn token_set_ratio_empty_inputs() {
        assert_eq!(token_set_ratio("", ""), 1.0);
        assert_eq!(token_set_ratio("euston", ""), 0.0);
    }
}
