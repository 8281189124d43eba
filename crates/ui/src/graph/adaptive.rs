//! Adaptive scan trigger evaluation.
//!
//! Provides runtime evaluation of trigger conditions for adaptive scans.
//! Triggers can detect threshold crossings or peaks in signal data.

use crate::graph::nodes::{ThresholdOp, TriggerCondition, TriggerLogic};
use find_peaks::PeakFinder;

/// Detected peak information.
#[derive(Debug, Clone)]
pub struct DetectedPeak {
    /// Index in the signal array
    pub index: usize,
    /// Signal value at peak
    pub height: f64,
    /// Position (if axis values provided)
    pub position: Option<f64>,
}

/// Detect peaks in a signal using prominence-based filtering.
///
/// # Arguments
/// * `signal` - Signal values to analyze
/// * `min_prominence` - Minimum prominence for peak detection
/// * `min_height` - Optional minimum height threshold
///
/// # Returns
/// Vector of detected peaks sorted by height (highest first)
pub fn detect_peaks(
    signal: &[f64],
    min_prominence: f64,
    min_height: Option<f64>,
) -> Vec<DetectedPeak> {
    if signal.is_empty() {
        return Vec::new();
    }

    let mut fp = PeakFinder::new(signal);
    fp.with_min_prominence(min_prominence);

    if let Some(height) = min_height {
        fp.with_min_height(height);
    }

    let mut peaks: Vec<DetectedPeak> = fp
        .find_peaks()
        .iter()
        .map(|p| DetectedPeak {
            index: p.middle_position(),
            height: p.height.unwrap_or(0.0),
            position: None,
        })
        .collect();

    // Sort by height descending
    peaks.sort_by(|a, b| {
        b.height
            .partial_cmp(&a.height)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    peaks
}

/// Evaluate a threshold condition against current value.
pub fn evaluate_threshold(value: f64, operator: &ThresholdOp, threshold: f64) -> bool {
    match operator {
        ThresholdOp::LessThan => value < threshold,
        ThresholdOp::GreaterThan => value > threshold,
        ThresholdOp::EqualWithin { tolerance } => (value - threshold).abs() <= *tolerance,
    }
}

/// Result of trigger evaluation.
#[derive(Debug, Clone)]
pub struct TriggerResult {
    /// Whether the trigger fired
    pub fired: bool,
    /// Detected peak (if peak detection trigger)
    pub peak: Option<DetectedPeak>,
    /// Which trigger(s) fired (by index)
    pub fired_triggers: Vec<usize>,
}

/// Evaluate trigger conditions against scan data.
///
/// # Arguments
/// * `triggers` - Trigger conditions to evaluate
/// * `logic` - AND/OR logic for combining triggers
/// * `signal` - Current signal data from scan
/// * `positions` - Optional position values corresponding to signal
///
/// # Returns
/// TriggerResult indicating whether triggers fired and any detected peaks
pub fn evaluate_triggers(
    triggers: &[TriggerCondition],
    logic: &TriggerLogic,
    signal: &[f64],
    positions: Option<&[f64]>,
) -> TriggerResult {
    if triggers.is_empty() {
        return TriggerResult {
            fired: false,
            peak: None,
            fired_triggers: Vec::new(),
        };
    }

    let mut fired_triggers = Vec::new();
    let mut detected_peak = None;

    for (idx, trigger) in triggers.iter().enumerate() {
        let fired = match trigger {
            TriggerCondition::Threshold {
                operator, value, ..
            } => {
                // Check if any signal value crosses threshold
                signal
                    .iter()
                    .any(|&v| evaluate_threshold(v, operator, *value))
            }
            TriggerCondition::PeakDetection {
                min_prominence,
                min_height,
                ..
            } => {
                let peaks = detect_peaks(signal, *min_prominence, *min_height);
                if let Some(peak) = peaks.first() {
                    // Add position if available
                    let mut peak_with_pos = peak.clone();
                    if let Some(positions) = positions {
                        if peak.index < positions.len() {
                            peak_with_pos.position = Some(positions[peak.index]);
                        }
                    }
                    detected_peak = Some(peak_with_pos);
                    true
                } else {
                    false
                }
            }
        };

        if fired {
            fired_triggers.push(idx);
        }
    }

    let overall_fired = match logic {
        TriggerLogic::Any => !fired_triggers.is_empty(),
        TriggerLogic::All => fired_triggers.len() == triggers.len(),
    };

    TriggerResult {
        fired: overall_fired,
        peak: detected_peak,
        fired_triggers,
    }
}
