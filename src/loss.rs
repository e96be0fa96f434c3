// Classification loss over column-major batches: every column of a score matrix holds the class
// scores of one sample.

use crate::error::ModelError;
use ndarray::{Array2, ArrayView2, Axis};

// Column-wise log of the softmax, computed as `z - max(z) - ln(sum(exp(z - max(z))))` so large
// scores don't overflow.
pub fn log_softmax(logits: ArrayView2<f64>) -> Array2<f64> {
    let mut log_probs = logits.to_owned();

    for mut column in log_probs.columns_mut() {
        let max = column.fold(f64::NEG_INFINITY, |max, &z| max.max(z));
        column.mapv_inplace(|z| z - max);
        let log_sum_exp = column.mapv(f64::exp).sum().ln();
        column.mapv_inplace(|z| z - log_sum_exp);
    }

    log_probs
}

// Mean negative log-probability assigned to the true label of each column.
pub fn nll_loss(log_probs: ArrayView2<f64>, labels: &[usize]) -> Result<f64, ModelError> {
    check_labels(log_probs, labels)?;

    let total: f64 = labels
        .iter()
        .enumerate()
        .map(|(column, &label)| -log_probs[[label, column]])
        .sum();

    Ok(total / labels.len() as f64)
}

// Cross-entropy on raw class scores; the same as `nll_loss(log_softmax(logits))`.
pub fn cross_entropy(logits: ArrayView2<f64>, labels: &[usize]) -> Result<f64, ModelError> {
    nll_loss(log_softmax(logits).view(), labels)
}

// Gradient of the mean negative log-likelihood with respect to the logits that produced
// `log_probs`. Per column this is `(softmax - one_hot(label)) / batch`.
pub fn nll_loss_backward(
    log_probs: ArrayView2<f64>,
    labels: &[usize],
) -> Result<Array2<f64>, ModelError> {
    check_labels(log_probs, labels)?;

    let batch = labels.len() as f64;
    let mut grad = log_probs.mapv(f64::exp);
    for (mut column, &label) in grad.axis_iter_mut(Axis(1)).zip(labels) {
        column[label] -= 1.0;
    }
    grad.mapv_inplace(|g| g / batch);

    Ok(grad)
}

fn check_labels(scores: ArrayView2<f64>, labels: &[usize]) -> Result<(), ModelError> {
    let (classes, batch) = scores.dim();
    if labels.is_empty() {
        return Err(ModelError::EmptyBatch);
    }
    if labels.len() != batch {
        return Err(ModelError::ShapeMismatch {
            what: "labels",
            got: labels.len(),
            expected: batch,
        });
    }
    if let Some(&label) = labels.iter().find(|&&label| label >= classes) {
        return Err(ModelError::LabelOutOfRange { label, classes });
    }
    Ok(())
}
