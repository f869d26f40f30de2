use crate::error::LabelCountMismatchError;
use crate::tensor::OutputTensor;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::{fs, io};

/// Largest value a quantized output score can take.
pub const QUANTIZED_MAX: f32 = 255.0;

pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Reads one label per line. Line order is the output tensor index order.
pub fn load_labels(path: &Path) -> io::Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelScore<'a> {
    pub label: &'a str,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationResult {
    Label { label: String, percentage: f32 },
    NoConfidentPrediction,
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationResult::Label { label, percentage } => {
                write!(f, "{label} ({percentage:.1}%)")
            }
            ClassificationResult::NoConfidentPrediction => f.write_str("No confident predictions"),
        }
    }
}

/// Pairs each score with the label at the same position and normalizes it to [0, 1].
pub fn label_scores<'a>(
    output: &OutputTensor,
    labels: &'a [String],
) -> Result<Vec<LabelScore<'a>>, LabelCountMismatchError> {
    if labels.len() != output.len() {
        return Err(LabelCountMismatchError {
            labels: labels.len(),
            scores: output.len(),
        });
    }
    Ok(labels
        .iter()
        .zip(output.as_slice())
        .map(|(label, &q)| LabelScore {
            label: label.as_str(),
            confidence: q as f32 / QUANTIZED_MAX,
        })
        .collect())
}

/// Picks the most confident score at or above `threshold`. Ties keep the
/// earliest label.
pub fn select_best(scores: &[LabelScore<'_>], threshold: f32) -> ClassificationResult {
    let best = scores
        .iter()
        .filter(|s| s.confidence >= threshold)
        .fold(None::<&LabelScore>, |best, s| match best {
            Some(b) if b.confidence >= s.confidence => Some(b),
            _ => Some(s),
        });
    match best {
        Some(s) => ClassificationResult::Label {
            label: s.label.to_string(),
            percentage: (s.confidence * 100.0).clamp(0.0, 100.0),
        },
        None => ClassificationResult::NoConfidentPrediction,
    }
}

pub fn score(
    output: &OutputTensor,
    labels: &[String],
    threshold: f32,
) -> Result<ClassificationResult, LabelCountMismatchError> {
    let scores = label_scores(output, labels)?;
    Ok(select_best(&scores, threshold))
}

/// Shared handle to a scorer's threshold.
#[derive(Debug, Clone)]
pub struct Threshold(Arc<AtomicU32>);

impl Threshold {
    pub fn new(value: f32) -> Self {
        Self(Arc::new(AtomicU32::new(value.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed)
    }
}

/// Label set plus a threshold that may change while frames are scored.
#[derive(Debug)]
pub struct LabelScorer {
    labels: Vec<String>,
    threshold: Threshold,
}

impl LabelScorer {
    pub fn new(labels: Vec<String>, threshold: f32) -> Self {
        Self {
            labels,
            threshold: Threshold::new(threshold),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold.clone()
    }

    pub fn score(&self, output: &OutputTensor) -> Result<ClassificationResult, LabelCountMismatchError> {
        score(output, &self.labels, self.threshold.get())
    }
}
