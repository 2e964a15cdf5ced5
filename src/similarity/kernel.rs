//! TF-IDF centroid kernel between two snippet collections.

use std::collections::{BTreeMap, HashMap};

use crate::query::stemmed_tokens;

/// A similarity function over two collections of representative texts.
pub trait ContentKernel {
    /// Similarity of `a` and `b`, or `None` when either side carries no
    /// usable tokens.
    fn similarity(&self, a: &[String], b: &[String]) -> Option<f64>;
}

/// Cosine similarity of the normalized TF-IDF centroids of two collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TfIdfKernel;

impl ContentKernel for TfIdfKernel {
    fn similarity(&self, a: &[String], b: &[String]) -> Option<f64> {
        content_kernel(a, b)
    }
}

type SparseVector = BTreeMap<String, f64>;

/// Computes term frequencies for each document and document frequencies for
/// each term.
fn compute_tf_df(documents: &[Vec<String>]) -> (Vec<HashMap<&str, usize>>, HashMap<&str, usize>) {
    let mut tfs = Vec::with_capacity(documents.len());
    let mut dfs: HashMap<&str, usize> = HashMap::new();

    for tokens in documents {
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for token in tokens {
            *tf.entry(token.as_str()).or_insert(0) += 1;
        }
        for term in tf.keys() {
            *dfs.entry(*term).or_insert(0) += 1;
        }
        tfs.push(tf);
    }
    (tfs, dfs)
}

/// Smoothed IDF, as if one extra document contained every term once.
fn smooth_idf(df: usize, n: usize) -> f64 {
    ((1.0 + n as f64) / (1.0 + df as f64)).ln() + 1.0
}

fn l2_norm(vector: &SparseVector) -> f64 {
    vector.values().map(|v| v * v).sum::<f64>().sqrt()
}

/// Scales `vector` to unit length. Returns `None` for the zero vector.
fn normalized(mut vector: SparseVector) -> Option<SparseVector> {
    let norm = l2_norm(&vector);
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    for value in vector.values_mut() {
        *value /= norm;
    }
    Some(vector)
}

/// Unit-length centroid of the unit-length document vectors.
fn centroid(vectors: &[SparseVector]) -> Option<SparseVector> {
    let mut sum = SparseVector::new();
    for vector in vectors {
        for (term, value) in vector {
            *sum.entry(term.clone()).or_insert(0.0) += value;
        }
    }
    normalized(sum)
}

fn inner_product(a: &SparseVector, b: &SparseVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, value)| large.get(term).map(|other| value * other))
        .sum()
}

/// Kernel value between two snippet collections.
///
/// Both collections are vectorized together over their combined vocabulary,
/// each document vector is L2-normalized, the vectors of each side are summed
/// into a centroid which is normalized again, and the inner product of the two
/// centroids is returned. Documents without tokens are ignored; a side with
/// no usable document yields `None`.
pub fn content_kernel(a: &[String], b: &[String]) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let documents: Vec<Vec<String>> = a.iter().chain(b).map(|d| stemmed_tokens(d)).collect();
    let (tfs, dfs) = compute_tf_df(&documents);
    let n = documents.len();

    let vectors: Vec<Option<SparseVector>> = tfs
        .iter()
        .map(|tf| {
            let vector: SparseVector = tf
                .iter()
                .map(|(term, &count)| {
                    let idf = smooth_idf(dfs.get(term).copied().unwrap_or(0), n);
                    (term.to_string(), count as f64 * idf)
                })
                .collect();
            normalized(vector)
        })
        .collect();

    let (left, right) = vectors.split_at(a.len());
    let left: Vec<SparseVector> = left.iter().flatten().cloned().collect();
    let right: Vec<SparseVector> = right.iter().flatten().cloned().collect();

    let qe_a = centroid(&left)?;
    let qe_b = centroid(&right)?;
    Some(inner_product(&qe_a, &qe_b))
}
