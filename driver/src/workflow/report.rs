use std::collections::BTreeSet;

/// Ground truth and model answer for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub pid: usize,
    pub truth: String,
    pub answer: String,
}

pub fn accuracy(predictions: &[Prediction]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let hits = predictions.iter().filter(|p| p.truth == p.answer).count();
    hits as f64 / predictions.len() as f64
}

/// Unweighted mean of per-label F1 over every label seen as truth or answer.
pub fn macro_f1(predictions: &[Prediction]) -> f64 {
    let labels: BTreeSet<&str> = predictions
        .iter()
        .flat_map(|p| [p.truth.as_str(), p.answer.as_str()])
        .collect();
    if labels.is_empty() {
        return 0.0;
    }

    let total: f64 = labels
        .iter()
        .map(|&label| {
            let tp = predictions
                .iter()
                .filter(|p| p.truth == label && p.answer == label)
                .count();
            let fp = predictions
                .iter()
                .filter(|p| p.truth != label && p.answer == label)
                .count();
            let fn_ = predictions
                .iter()
                .filter(|p| p.truth == label && p.answer != label)
                .count();
            let denom = 2 * tp + fp + fn_;
            if denom == 0 {
                0.0
            } else {
                2.0 * tp as f64 / denom as f64
            }
        })
        .sum();
    total / labels.len() as f64
}

/// Text of `predictions.txt`.
pub fn render(predictions: &[Prediction]) -> String {
    let mut out = String::new();
    for p in predictions {
        out.push_str(&format!("[{}] GT: {}, Pred: {}\n", p.pid, p.truth, p.answer));
    }
    out.push_str(&format!("Accuracy: {}\n", accuracy(predictions)));
    out.push_str(&format!("F1 Score: {}\n", macro_f1(predictions)));
    out
}
