// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::cmp::Ordering;

use model_runtime::RawOutput;
use protocol::{BackendFamily, ClassScore, Decision, InferenceResult};
use thiserror::Error;

use crate::labels::LabelTable;

/// number of ranked classes carried in `top_k`.
pub const TOP_K: usize = 5;

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// the model predicts more classes than the label table knows about.
    #[error("predicted class {index} is outside the label table ({len} labels)")]
    LabelIndexOutOfRange { index: usize, len: usize },

    #[error("logit {index} is not a finite number")]
    NonFiniteLogit { index: usize },
}

/// softmax with the row maximum subtracted first, so large logits cannot
/// overflow `exp`.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// index of the largest value; the first one wins a tie. NaN never wins.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// turn one raw forward pass into the caller-facing result.
pub fn normalize(
    raw: &RawOutput,
    decision: &Decision,
    elapsed_ms: f64,
    backend: BackendFamily,
    labels: &LabelTable,
) -> Result<InferenceResult, NormalizeError> {
    let logits = raw.first_row();
    if let Some(index) = logits.iter().position(|v| !v.is_finite()) {
        return Err(NormalizeError::NonFiniteLogit { index });
    }

    let probs = softmax(logits);
    let index = argmax(&probs).ok_or(NormalizeError::LabelIndexOutOfRange {
        index: 0,
        len: labels.len(),
    })?;
    let prediction = labels
        .get(index)
        .ok_or(NormalizeError::LabelIndexOutOfRange {
            index,
            len: labels.len(),
        })?
        .to_string();

    Ok(InferenceResult {
        prediction,
        class_index: index,
        confidence: probs[index].clamp(0.0, 1.0),
        latency_ms: elapsed_ms.max(0.0),
        backend,
        artifact_path: decision.artifact_path.clone(),
        top_k: top_k(&probs, labels, TOP_K),
    })
}

/// highest `k` probabilities, best first. classes the label table does not
/// cover are skipped here; only the winner is held to the table length.
fn top_k(probs: &[f32], labels: &LabelTable, k: usize) -> Vec<ClassScore> {
    let mut order: Vec<usize> = (0..probs.len()).collect();
    // stable sort keeps lower indices first among equals.
    order.sort_by(|&a, &b| {
        probs[b]
            .partial_cmp(&probs[a])
            .unwrap_or(Ordering::Equal)
    });

    order
        .into_iter()
        .filter_map(|i| {
            labels.get(i).map(|label| ClassScore {
                index: i,
                label: label.to_string(),
                probability: probs[i],
            })
        })
        .take(k)
        .collect()
}
