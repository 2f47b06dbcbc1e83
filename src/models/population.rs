use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PopulationError {
    #[error("Ragged: row {row} has {actual} genes, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// A batch of candidate solutions, one row per individual.
///
/// All rows share the same dimensionality. An empty population has dimension 0.
/// Serialized as a plain list of rows, deserializing rejects ragged rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct Population {
    rows: Vec<Vec<f64>>,
}

impl Population {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, PopulationError> {
        if let Some(first) = rows.first() {
            let expected = first.len();
            if let Some((row, actual)) = rows
                .iter()
                .map(Vec::len)
                .enumerate()
                .find(|(_, len)| *len != expected)
            {
                return Err(PopulationError::Ragged {
                    row,
                    expected,
                    actual,
                });
            }
        }

        Ok(Self { rows })
    }

    // Rows produced by the crate's own operators are rectangular by construction
    pub(crate) fn from_rows_unchecked(rows: Vec<Vec<f64>>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0].len() == w[1].len()));
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }
}

impl TryFrom<Vec<Vec<f64>>> for Population {
    type Error = PopulationError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<Population> for Vec<Vec<f64>> {
    fn from(population: Population) -> Self {
        population.rows
    }
}
