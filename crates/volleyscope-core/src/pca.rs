// Principal component analysis over standardized season vectors.
//
// Top components are extracted by power iteration with deflation rather than
// an exact eigensolver. Each new start vector is orthogonalized against the
// components already found, and iterates are kept orthogonal to them, so a
// start that happens to sit in the null space (e.g. the uniform vector for
// perfectly anti-correlated features) cannot produce a duplicate component.
// Eigenvector sign is fixed by making the largest-magnitude entry positive.

use serde::Serialize;
use tracing::debug;

use crate::features::FeatureScheme;

/// Upper bound on the number of extracted components (x, y, z).
pub const MAX_COMPONENTS: usize = 3;

/// Norms below this are treated as zero during iteration.
const NORM_EPSILON: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Options and model
// ---------------------------------------------------------------------------

/// Tuning knobs for power iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcaOptions {
    /// Components to extract, clamped to `1..=MAX_COMPONENTS` and the
    /// vector dimension.
    pub components: usize,
    pub max_iterations: usize,
    /// Stop once the iterate moves less than this between steps.
    pub tolerance: f64,
}

impl Default for PcaOptions {
    fn default() -> Self {
        PcaOptions {
            components: MAX_COMPONENTS,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

/// A fitted PCA basis. Rebuilt from scratch for every population.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PcaModel {
    /// Unit-length principal directions, strongest first.
    pub components: Vec<Vec<f64>>,
    /// Eigenvalue for each component, descending.
    pub explained_variance: Vec<f64>,
    /// Column means used for centering.
    pub mean: Vec<f64>,
    /// Trace of the covariance matrix.
    pub total_variance: f64,
}

/// A feature's weight on one principal direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Loading {
    pub label: &'static str,
    pub weight: f64,
}

impl PcaModel {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Share of the total variance captured by each component. Empty when the
    /// population has no variance at all.
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        if self.total_variance <= NORM_EPSILON {
            return Vec::new();
        }
        self.explained_variance
            .iter()
            .map(|v| v / self.total_variance)
            .collect()
    }

    /// The `k` features with the largest absolute weight on `component`,
    /// strongest first. Empty if the component does not exist.
    ///
    /// # Panics
    /// If the scheme's dimension differs from the model's.
    pub fn top_loadings(&self, component: usize, scheme: FeatureScheme, k: usize) -> Vec<Loading> {
        let Some(direction) = self.components.get(component) else {
            return Vec::new();
        };
        let labels = scheme.labels();
        assert_eq!(
            labels.len(),
            direction.len(),
            "scheme {} has {} features but the model has {}",
            scheme.version(),
            labels.len(),
            direction.len()
        );
        let mut loadings: Vec<Loading> = labels
            .into_iter()
            .zip(direction.iter())
            .map(|(label, weight)| Loading {
                label,
                weight: *weight,
            })
            .collect();
        loadings.sort_by(|a, b| {
            b.weight
                .abs()
                .partial_cmp(&a.weight.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        loadings.truncate(k);
        loadings
    }
}

/// Projected coordinates of one player.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    fn from_axes(axes: [f64; MAX_COMPONENTS]) -> Self {
        Point3 {
            x: axes[0],
            y: axes[1],
            z: axes[2],
        }
    }
}

/// Projections for every input vector (same order) and the fitted model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PcaResult {
    pub projections: Vec<Point3>,
    pub model: PcaModel,
}

// ---------------------------------------------------------------------------
// Vector helpers
// ---------------------------------------------------------------------------

/// Dot product of two equal-length vectors.
///
/// # Panics
/// On length mismatch, which means two different feature orders were mixed.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(
        a.len(),
        b.len(),
        "dot product of vectors with different lengths: {} vs {}",
        a.len(),
        b.len()
    );
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn mat_vec(matrix: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    matrix.iter().map(|row| dot(row, v)).collect()
}

/// Remove the components of `v` along each (unit) basis vector.
fn orthogonalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for b in basis {
        let along = dot(v, b);
        for (x, y) in v.iter_mut().zip(b.iter()) {
            *x -= along * y;
        }
    }
}

fn normalized(mut v: Vec<f64>) -> Option<Vec<f64>> {
    let n = norm(&v);
    if n <= NORM_EPSILON {
        return None;
    }
    for x in v.iter_mut() {
        *x /= n;
    }
    Some(v)
}

// ---------------------------------------------------------------------------
// Covariance and eigen extraction
// ---------------------------------------------------------------------------

fn column_means(vectors: &[Vec<f64>], dim: usize) -> Vec<f64> {
    let n = vectors.len() as f64;
    let mut mean = vec![0.0; dim];
    for v in vectors {
        assert_eq!(
            v.len(),
            dim,
            "PCA input vector length mismatch: {} vs {}",
            v.len(),
            dim
        );
        for (m, x) in mean.iter_mut().zip(v.iter()) {
            *m += x;
        }
    }
    for m in mean.iter_mut() {
        *m /= n;
    }
    mean
}

/// Sample covariance (`N − 1` denominator, floored at 1 for a single row).
fn covariance(centered: &[Vec<f64>], dim: usize) -> Vec<Vec<f64>> {
    let denom = centered.len().saturating_sub(1).max(1) as f64;
    let mut cov = vec![vec![0.0; dim]; dim];
    for i in 0..dim {
        for j in i..dim {
            let s: f64 = centered.iter().map(|row| row[i] * row[j]).sum();
            cov[i][j] = s / denom;
            cov[j][i] = s / denom;
        }
    }
    cov
}

/// Deterministic start: the uniform vector, or the first basis vector that
/// survives orthogonalization against the components found so far.
fn start_vector(dim: usize, found: &[Vec<f64>]) -> Vec<f64> {
    let uniform = vec![1.0 / (dim as f64).sqrt(); dim];
    let candidates = std::iter::once(uniform).chain((0..dim).map(|i| {
        let mut e = vec![0.0; dim];
        e[i] = 1.0;
        e
    }));
    for mut candidate in candidates {
        orthogonalize(&mut candidate, found);
        if let Some(v) = normalized(candidate) {
            return v;
        }
    }
    // Only reachable when `found` already spans the space.
    vec![0.0; dim]
}

/// Flip so the largest-magnitude entry is positive.
fn fix_sign(v: &mut [f64]) {
    let mut pivot = 0.0_f64;
    for x in v.iter() {
        if x.abs() > pivot.abs() {
            pivot = *x;
        }
    }
    if pivot < 0.0 {
        for x in v.iter_mut() {
            *x = -*x;
        }
    }
}

/// Power iteration on `matrix`, returning (unit eigenvector, eigenvalue,
/// iterations used).
fn power_iteration(
    matrix: &[Vec<f64>],
    found: &[Vec<f64>],
    options: &PcaOptions,
) -> (Vec<f64>, f64, usize) {
    let dim = matrix.len();
    let mut v = start_vector(dim, found);
    let mut iterations = 0;

    for _ in 0..options.max_iterations {
        iterations += 1;
        let mut w = mat_vec(matrix, &v);
        orthogonalize(&mut w, found);
        let Some(next) = normalized(w) else {
            // `v` lies in the null space of the (deflated) matrix.
            break;
        };
        let change = norm(
            &next
                .iter()
                .zip(v.iter())
                .map(|(a, b)| a - b)
                .collect::<Vec<f64>>(),
        );
        v = next;
        if change < options.tolerance {
            break;
        }
    }

    let eigenvalue = dot(&v, &mat_vec(matrix, &v)).max(0.0);
    (v, eigenvalue, iterations)
}

/// Subtract `eigenvalue · v vᵀ` in place.
fn deflate(matrix: &mut [Vec<f64>], v: &[f64], eigenvalue: f64) {
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell -= eigenvalue * v[i] * v[j];
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Fit PCA on a population of equal-length vectors and project each of them.
///
/// An empty population yields empty projections and an empty model.
///
/// # Panics
/// If the vectors do not all have the same length.
pub fn compute_pca_3d(vectors: &[Vec<f64>], options: &PcaOptions) -> PcaResult {
    let Some(first) = vectors.first() else {
        return PcaResult::default();
    };
    let dim = first.len();

    let mean = column_means(vectors, dim);
    let centered: Vec<Vec<f64>> = vectors
        .iter()
        .map(|v| v.iter().zip(mean.iter()).map(|(x, m)| x - m).collect())
        .collect();
    let cov = covariance(&centered, dim);
    let total_variance: f64 = (0..dim).map(|i| cov[i][i]).sum();

    // Deflation works on a private copy.
    let mut work = cov.clone();
    let wanted = options.components.clamp(1, MAX_COMPONENTS).min(dim);
    let mut pairs: Vec<(Vec<f64>, f64)> = Vec::with_capacity(wanted);
    let mut found: Vec<Vec<f64>> = Vec::with_capacity(wanted);

    for component in 0..wanted {
        let (mut v, eigenvalue, iterations) = power_iteration(&work, &found, options);
        deflate(&mut work, &v, eigenvalue);
        found.push(v.clone());
        fix_sign(&mut v);
        debug!(component, iterations, eigenvalue, "extracted principal component");
        pairs.push((v, eigenvalue));
    }

    pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let (components, explained_variance): (Vec<Vec<f64>>, Vec<f64>) = pairs.into_iter().unzip();

    let model = PcaModel {
        components,
        explained_variance,
        mean,
        total_variance,
    };
    let projections = vectors
        .iter()
        .map(|v| project_to_3d(v, Some(&model)))
        .collect();

    PcaResult { projections, model }
}

/// Project a single vector with a previously fitted model.
///
/// Missing axes (a model with fewer than three components) are 0. With no
/// model, or an empty one, the first three raw entries are used directly.
///
/// # Panics
/// If the vector length differs from the model's dimension.
pub fn project_to_3d(vector: &[f64], model: Option<&PcaModel>) -> Point3 {
    let mut axes = [0.0; MAX_COMPONENTS];

    match model.filter(|m| !m.is_empty()) {
        Some(model) => {
            assert_eq!(
                vector.len(),
                model.mean.len(),
                "cannot project a {}-dimension vector with a {}-dimension model",
                vector.len(),
                model.mean.len()
            );
            let centered: Vec<f64> = vector
                .iter()
                .zip(model.mean.iter())
                .map(|(x, m)| x - m)
                .collect();
            for (axis, component) in axes.iter_mut().zip(model.components.iter()) {
                *axis = dot(&centered, component);
            }
        }
        None => {
            for (axis, value) in axes.iter_mut().zip(vector.iter()) {
                *axis = *value;
            }
        }
    }

    Point3::from_axes(axes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    /// Axis-aligned population with column variances 1.6, 0.4, 0.1.
    fn axis_aligned() -> Vec<Vec<f64>> {
        vec![
            vec![2.0, 0.0, 0.0],
            vec![-2.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, -1.0, 0.0],
            vec![0.0, 0.0, 0.5],
            vec![0.0, 0.0, -0.5],
        ]
    }

    /// A less tidy population for ordering / round-trip checks.
    fn messy() -> Vec<Vec<f64>> {
        vec![
            vec![0.3, -1.2, 0.8, 2.0, -0.5],
            vec![1.1, 0.4, -0.7, -1.0, 0.2],
            vec![-0.6, 0.9, 1.5, 0.3, -1.1],
            vec![-1.4, -0.3, -0.2, 0.7, 1.6],
            vec![0.9, 1.0, -1.3, -1.6, 0.4],
            vec![-0.3, -0.8, -0.1, -0.4, 0.4],
        ]
    }

    #[test]
    fn empty_population_gives_empty_result() {
        let result = compute_pca_3d(&[], &PcaOptions::default());
        assert!(result.projections.is_empty());
        assert!(result.model.components.is_empty());
        assert!(result.model.explained_variance.is_empty());
        assert!(result.model.mean.is_empty());
    }

    #[test]
    fn recovers_axis_aligned_components() {
        let result = compute_pca_3d(&axis_aligned(), &PcaOptions::default());
        let model = &result.model;
        assert_eq!(model.components.len(), 3);
        let expected = [1.6, 0.4, 0.1];
        for (got, want) in model.explained_variance.iter().zip(expected) {
            assert!(approx_eq(*got, want, 1e-6), "eigenvalue {got} vs {want}");
        }
        for (i, component) in model.components.iter().enumerate() {
            for (j, w) in component.iter().enumerate() {
                let want = if i == j { 1.0 } else { 0.0 };
                assert!(approx_eq(*w, want, 1e-4), "component {i}[{j}] = {w}");
            }
        }
        assert!(approx_eq(model.total_variance, 2.1, 1e-12));
    }

    #[test]
    fn explained_variance_is_descending() {
        let result = compute_pca_3d(&messy(), &PcaOptions::default());
        let ev = &result.model.explained_variance;
        assert_eq!(ev.len(), 3);
        assert!(ev.windows(2).all(|w| w[0] >= w[1]), "{ev:?}");
    }

    #[test]
    fn components_are_unit_length_and_orthogonal() {
        let result = compute_pca_3d(&messy(), &PcaOptions::default());
        let c = &result.model.components;
        for v in c {
            assert!(approx_eq(norm(v), 1.0, 1e-9));
        }
        assert!(approx_eq(dot(&c[0], &c[1]), 0.0, 1e-6));
        assert!(approx_eq(dot(&c[0], &c[2]), 0.0, 1e-6));
        assert!(approx_eq(dot(&c[1], &c[2]), 0.0, 1e-6));
    }

    #[test]
    fn single_vector_projection_round_trips() {
        let data = messy();
        let result = compute_pca_3d(&data, &PcaOptions::default());
        for (v, p) in data.iter().zip(result.projections.iter()) {
            let q = project_to_3d(v, Some(&result.model));
            assert_eq!(*p, q);
        }
    }

    #[test]
    fn correlated_pair_collapses_onto_first_axis() {
        let data = vec![vec![1.0, 1.0], vec![2.0, 2.0], vec![3.0, 3.0]];
        let result = compute_pca_3d(&data, &PcaOptions::default());
        let s = std::f64::consts::SQRT_2;
        assert_eq!(result.model.components.len(), 2);
        assert!(approx_eq(result.model.explained_variance[0], 2.0, 1e-9));
        assert!(approx_eq(result.model.explained_variance[1], 0.0, 1e-9));
        let xs: Vec<f64> = result.projections.iter().map(|p| p.x).collect();
        assert!(approx_eq(xs[0], -s, 1e-9));
        assert!(approx_eq(xs[1], 0.0, 1e-9));
        assert!(approx_eq(xs[2], s, 1e-9));
        // Fewer than three dimensions: z defaults to 0.
        assert!(result.projections.iter().all(|p| p.z == 0.0));
    }

    #[test]
    fn anti_correlated_pair_escapes_null_space_start() {
        // The uniform start vector is an eigenvector with eigenvalue 0 here.
        let data = vec![vec![1.0, 3.0], vec![2.0, 2.0], vec![3.0, 1.0]];
        let result = compute_pca_3d(&data, &PcaOptions::default());
        let first = &result.model.components[0];
        let h = 1.0 / std::f64::consts::SQRT_2;
        assert!(approx_eq(result.model.explained_variance[0], 2.0, 1e-9));
        assert!(approx_eq(first[0].abs(), h, 1e-9));
        assert!(approx_eq(first[1].abs(), h, 1e-9));
        assert!(first[0] * first[1] < 0.0);
    }

    #[test]
    fn sign_convention_makes_largest_entry_positive() {
        let result = compute_pca_3d(&messy(), &PcaOptions::default());
        for c in &result.model.components {
            let pivot = c
                .iter()
                .copied()
                .fold(0.0_f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
            assert!(pivot > 0.0);
        }
    }

    #[test]
    fn single_row_has_zero_variance() {
        let result = compute_pca_3d(&[vec![1.0, 2.0, 3.0, 4.0]], &PcaOptions::default());
        assert_eq!(result.model.components.len(), 3);
        assert!(result.model.explained_variance.iter().all(|v| *v == 0.0));
        assert_eq!(result.projections, vec![Point3::default()]);
        assert!(result.model.explained_variance_ratio().is_empty());
    }

    #[test]
    fn component_count_is_clamped() {
        let opts = PcaOptions {
            components: 2,
            ..PcaOptions::default()
        };
        let result = compute_pca_3d(&messy(), &opts);
        assert_eq!(result.model.components.len(), 2);
        assert!(result.projections.iter().all(|p| p.z == 0.0));
    }

    #[test]
    fn projection_without_model_reads_raw_entries() {
        let p = project_to_3d(&[0.5, -1.0, 2.0, 9.0], None);
        assert_eq!(p, Point3 { x: 0.5, y: -1.0, z: 2.0 });
        let p = project_to_3d(&[0.5], Some(&PcaModel::default()));
        assert_eq!(p, Point3 { x: 0.5, y: 0.0, z: 0.0 });
    }

    #[test]
    #[should_panic(expected = "cannot project")]
    fn projection_rejects_dimension_mismatch() {
        let result = compute_pca_3d(&axis_aligned(), &PcaOptions::default());
        project_to_3d(&[1.0, 2.0], Some(&result.model));
    }

    #[test]
    fn variance_ratio_sums_to_at_most_one() {
        let result = compute_pca_3d(&axis_aligned(), &PcaOptions::default());
        let ratio = result.model.explained_variance_ratio();
        assert!(approx_eq(ratio[0], 1.6 / 2.1, 1e-6));
        assert!(ratio.iter().sum::<f64>() <= 1.0 + 1e-9);
    }

    #[test]
    fn top_loadings_rank_by_magnitude() {
        let model = PcaModel {
            components: vec![{
                let mut c = vec![0.0; 13];
                c[5] = -0.8;
                c[6] = 0.5;
                c[0] = 0.3;
                c
            }],
            explained_variance: vec![1.0],
            mean: vec![0.0; 13],
            total_variance: 1.0,
        };
        let top = model.top_loadings(0, FeatureScheme::V2Separated, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].label, "Assists");
        assert_eq!(top[1].label, "Digs");
        assert!(model.top_loadings(1, FeatureScheme::V2Separated, 2).is_empty());
    }
}
