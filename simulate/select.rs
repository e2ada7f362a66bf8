//! # Embryo Selection
//!
//! Per family, picks one embryo column either by maximum polygenic score or
//! uniformly at random, and gathers any cohort layer at the picked columns.
//! Column indices come straight from the matrix structure; nothing is recovered
//! from column labels.

use ndarray::parallel::prelude::*;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use thiserror::Error;

/// One chosen embryo column per family, each in `[0, embryos)`.
pub type SelectionIndex = Array1<usize>;

/// One outcome value per family, gathered at a [`SelectionIndex`].
pub type SelectedOutcomeVector = Array1<f64>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error(
        "Selection index has {index_len} entries but the matrix has {matrix_rows} families."
    )]
    ShapeMismatch {
        index_len: usize,
        matrix_rows: usize,
    },

    #[error("Selection index {index} for family {row} is outside [0, {embryos}).")]
    IndexOutOfRange {
        row: usize,
        index: usize,
        embryos: usize,
    },

    #[error("Cannot choose an embryo from families with no embryos.")]
    NoEmbryos,
}

/// Row-wise argmax. Ties resolve to the lowest column index.
pub fn select_by_max(scores: ArrayView2<f64>) -> SelectionIndex {
    let chosen: Vec<usize> = scores
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(argmax_first)
        .collect();
    Array1::from_vec(chosen)
}

fn argmax_first(row: ArrayView1<f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (column, &value) in row.iter().enumerate() {
        // Strict comparison keeps the earliest column on ties.
        if column == 0 || value > best_value {
            best = column;
            best_value = value;
        }
    }
    best
}

/// `families` independent draws from the discrete uniform law on `{0, …, embryos − 1}`.
pub fn select_random<R: Rng + ?Sized>(
    embryos: usize,
    families: usize,
    rng: &mut R,
) -> Result<SelectionIndex, SelectionError> {
    if embryos == 0 {
        return Err(SelectionError::NoEmbryos);
    }
    Ok((0..families).map(|_| rng.gen_range(0..embryos)).collect())
}

/// `out[row] = matrix[row, index[row]]`, after checking every index.
pub fn gather(
    matrix: ArrayView2<f64>,
    index: ArrayView1<usize>,
) -> Result<SelectedOutcomeVector, SelectionError> {
    let (rows, embryos) = matrix.dim();
    if index.len() != rows {
        return Err(SelectionError::ShapeMismatch {
            index_len: index.len(),
            matrix_rows: rows,
        });
    }
    if let Some((row, &bad)) = index.iter().enumerate().find(|&(_, &i)| i >= embryos) {
        return Err(SelectionError::IndexOutOfRange {
            row,
            index: bad,
            embryos,
        });
    }

    Ok(index
        .iter()
        .enumerate()
        .map(|(row, &column)| matrix[[row, column]])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::StandardNormal;

    #[test]
    fn argmax_matches_an_independent_row_maximum() {
        let mut rng = StdRng::seed_from_u64(5);
        let scores = Array2::from_shape_fn((500, 7), |_| rng.sample::<f64, _>(StandardNormal));
        let chosen = select_by_max(scores.view());
        for (row, &column) in chosen.iter().enumerate() {
            let max = scores.row(row).fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            assert_eq!(scores[[row, column]], max);
        }
    }

    #[test]
    fn ties_resolve_to_the_lowest_column() {
        let scores = array![[1.0, 3.0, 3.0], [2.0, 2.0, 2.0], [-1.0, -5.0, -1.0]];
        assert_eq!(select_by_max(scores.view()), array![1, 0, 0]);
    }

    #[test]
    fn random_selection_stays_in_range_and_covers_every_column() {
        let mut rng = StdRng::seed_from_u64(8);
        let picks = select_random(4, 10_000, &mut rng).unwrap();
        assert_eq!(picks.len(), 10_000);
        assert!(picks.iter().all(|&i| i < 4));
        for column in 0..4 {
            let count = picks.iter().filter(|&&i| i == column).count();
            assert!((2_200..2_800).contains(&count), "column {column}: {count}");
        }
        assert_eq!(
            select_random(0, 3, &mut rng),
            Err(SelectionError::NoEmbryos)
        );
    }

    #[test]
    fn gather_reads_the_chosen_cell_of_each_row() {
        let matrix = array![[0.0, 1.0, 2.0], [10.0, 11.0, 12.0], [20.0, 21.0, 22.0]];
        let index = array![2, 0, 1];
        let gathered = gather(matrix.view(), index.view()).unwrap();
        for row in 0..3 {
            assert_eq!(gathered[row], matrix[[row, index[row]]]);
        }
        assert_eq!(gathered, array![2.0, 10.0, 21.0]);
    }

    #[test]
    fn gather_rejects_bad_indices_before_reading() {
        let matrix = array![[0.0, 1.0], [2.0, 3.0]];
        assert_eq!(
            gather(matrix.view(), array![0, 2].view()),
            Err(SelectionError::IndexOutOfRange {
                row: 1,
                index: 2,
                embryos: 2
            })
        );
        assert_eq!(
            gather(matrix.view(), array![0].view()),
            Err(SelectionError::ShapeMismatch {
                index_len: 1,
                matrix_rows: 2
            })
        );
    }
}
