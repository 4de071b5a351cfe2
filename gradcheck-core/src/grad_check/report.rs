use thiserror::Error;

use crate::error::CoreError;

/// Errors that abort a gradient check.
///
/// These signal misuse of the checker (bad configuration, bad indices, layers
/// that cannot be driven), never a wrong gradient. Wrong gradients are collected
/// as [`Violation`]s so that one run reports all of them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("Layer or blob error during gradient check: {0}")]
    Core(CoreError),

    #[error("Invalid gradient checker configuration: {0}")]
    InvalidConfig(String),

    #[error("check_bottom {check_bottom} is out of range for {num_bottom} bottom blob(s)")]
    CheckBottomOutOfRange { check_bottom: usize, num_bottom: usize },

    #[error("Exhaustive mode requires at least one top blob.")]
    NoTopBlobs,

    #[error("Objective target top {top_id} is out of range for {num_top} top blob(s)")]
    TopOutOfRange { top_id: usize, num_top: usize },

    #[error("Objective target element {top_data_id} is out of range for top {top_id} of count {count}")]
    TopElementOutOfRange {
        top_id: usize,
        top_data_id: usize,
        count: usize,
    },

    #[error("Elementwise layer '{layer}' must not have parameter blobs, found {num_params}")]
    ElementwiseWithParameters { layer: String, num_params: usize },

    #[error("Elementwise layer '{layer}': bottom {bottom_index} has {actual} elements, targeted top has {expected}")]
    ElementwiseCountMismatch {
        layer: String,
        bottom_index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Bottom {bottom_index} and top {top_index} share storage; checked layers must not run in place")]
    AliasedBottomTop { bottom_index: usize, top_index: usize },

    #[error("Gradient check failed with {count} violation(s); first: {first}")]
    VerificationFailed { count: usize, first: Violation },
}

impl From<CoreError> for GradCheckError {
    fn from(err: CoreError) -> Self {
        GradCheckError::Core(err)
    }
}

fn fmt_index(index: &Option<usize>) -> String {
    index.map_or_else(|| "-1".to_string(), |i| i.to_string())
}

/// One verification failure. Values are widened to `f64` for reporting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error("forward in place changed the layer objective: {expected} (separate buffers) vs {actual} (in place)")]
    ForwardInPlaceObjective { expected: f64, actual: f64 },

    #[error("forward in place mismatch at top {top_index}, element {element}: {expected} (separate buffers) vs {actual} (in place)")]
    ForwardInPlaceData {
        top_index: usize,
        element: usize,
        expected: f64,
        actual: f64,
    },

    #[error("backward in place mismatch at bottom {bottom_index}, element {element}: {expected} (separate diffs) vs {actual} (shared diffs), tolerance {tolerance}")]
    BackwardInPlaceDiff {
        bottom_index: usize,
        element: usize,
        expected: f64,
        actual: f64,
        tolerance: f64,
    },

    #[error("gradient mismatch at (top_id, top_data_id, blob_id, feat_id)=({},{},{blob_id},{feat_id}): computed {computed}, estimated {estimated}, tolerance {tolerance}", fmt_index(.top_id), fmt_index(.top_data_id))]
    GradientMismatch {
        top_id: Option<usize>,
        top_data_id: Option<usize>,
        blob_id: usize,
        feat_id: usize,
        computed: f64,
        estimated: f64,
        tolerance: f64,
    },
}

/// Outcome of one or more gradient checks on a layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    pub violations: Vec<Violation>,
    /// Features whose analytic and estimated gradients were compared.
    pub features_checked: usize,
    /// Features skipped because their value fell in the kink band.
    pub features_in_kink: usize,
    pub forward_in_place_probes: usize,
    pub backward_in_place_probes: usize,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    /// Logs and stores a violation.
    pub fn record(&mut self, violation: Violation) {
        log::warn!("{}", violation);
        self.violations.push(violation);
    }

    pub fn merge(&mut self, other: CheckReport) {
        self.violations.extend(other.violations);
        self.features_checked += other.features_checked;
        self.features_in_kink += other.features_in_kink;
        self.forward_in_place_probes += other.forward_in_place_probes;
        self.backward_in_place_probes += other.backward_in_place_probes;
    }

    pub fn into_result(self) -> Result<Self, GradCheckError> {
        match self.violations.first() {
            None => Ok(self),
            Some(first) => Err(GradCheckError::VerificationFailed {
                count: self.violations.len(),
                first: first.clone(),
            }),
        }
    }

    /// Panics listing every violation. Meant for test code.
    pub fn assert_passed(&self) {
        if !self.is_ok() {
            let lines: Vec<String> = self.violations.iter().map(|v| format!("  {}", v)).collect();
            panic!(
                "gradient check failed with {} violation(s):\n{}",
                self.violations.len(),
                lines.join("\n")
            );
        }
    }
}

/// Per-layer outcome of a whole-net check, in layer order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetCheckReport {
    pub layers: Vec<(String, CheckReport)>,
}

impl NetCheckReport {
    pub fn is_ok(&self) -> bool {
        self.layers.iter().all(|(_, report)| report.is_ok())
    }

    pub fn total_violations(&self) -> usize {
        self.layers.iter().map(|(_, report)| report.violations.len()).sum()
    }

    pub fn layer(&self, name: &str) -> Option<&CheckReport> {
        self.layers
            .iter()
            .find(|(layer_name, _)| layer_name == name)
            .map(|(_, report)| report)
    }

    /// Panics listing every violation with its layer name. Meant for test code.
    pub fn assert_passed(&self) {
        if !self.is_ok() {
            let lines: Vec<String> = self
                .layers
                .iter()
                .flat_map(|(name, report)| report.violations.iter().map(move |v| format!("  [{}] {}", name, v)))
                .collect();
            panic!(
                "net gradient check failed with {} violation(s):\n{}",
                self.total_violations(),
                lines.join("\n")
            );
        }
    }
}
