//! Recording substrate used to observe what a processor asks of the kernel.

use crate::error::SubstrateError;
use crate::substrate::Substrate;
use crate::types::{MemMode, ModelId, TimelineIndex};
use std::sync::{Arc, Mutex, MutexGuard};

/// Everything a [`RecordingSubstrate`] has been asked to do, in call order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedCalls {
    /// Every successful swap, one entry per call
    pub swaps: Vec<Vec<(ModelId, ModelId)>>,

    /// Every timeline binding
    pub timelines: Vec<(ModelId, TimelineIndex)>,

    /// Number of host-acceleration requests
    pub host_acceleration_requests: usize,

    /// Last memory mode set on the board
    pub mem_mode: Option<MemMode>,
}

#[derive(Debug, Default)]
struct RecordingState {
    calls: RecordedCalls,
    pending_failure: Option<String>,
    pending_timeline_failure: Option<SubstrateError>,
}

/// Substrate double that performs nothing and records everything.
///
/// Swaps always succeed unless a failure was armed with
/// [`fail_next_swap`](Self::fail_next_swap). A failed swap is not recorded.
#[derive(Debug, Default)]
pub struct RecordingSubstrate {
    ruby: bool,
    state: Mutex<RecordingState>,
}

impl RecordingSubstrate {
    /// Creates a recording substrate with a classic (non-Ruby) cache hierarchy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the board reports a Ruby cache hierarchy.
    pub fn with_ruby(mut self, ruby: bool) -> Self {
        self.ruby = ruby;
        self
    }

    /// Creates an Arc-wrapped substrate for handing to a processor.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Makes the next `perform_atomic_swap` call fail with `reason`.
    pub fn fail_next_swap(&self, reason: impl Into<String>) {
        self.state().pending_failure = Some(reason.into());
    }

    /// Makes the next `assign_timeline` call fail with `error`.
    pub fn fail_next_timeline(&self, error: SubstrateError) {
        self.state().pending_timeline_failure = Some(error);
    }

    /// Returns a snapshot of the recorded calls.
    pub fn calls(&self) -> RecordedCalls {
        self.state().calls.clone()
    }

    /// Returns the number of successful swaps.
    pub fn swap_count(&self) -> usize {
        self.state().calls.swaps.len()
    }

    fn state(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Substrate for RecordingSubstrate {
    fn perform_atomic_swap(&self, pairs: &[(ModelId, ModelId)]) -> Result<(), SubstrateError> {
        let mut state = self.state();
        if let Some(reason) = state.pending_failure.take() {
            return Err(SubstrateError::SwapFailed(reason));
        }
        state.calls.swaps.push(pairs.to_vec());
        Ok(())
    }

    fn assign_timeline(
        &self,
        model: ModelId,
        timeline: TimelineIndex,
    ) -> Result<(), SubstrateError> {
        let mut state = self.state();
        if let Some(error) = state.pending_timeline_failure.take() {
            return Err(error);
        }
        state.calls.timelines.push((model, timeline));
        Ok(())
    }

    fn enable_host_acceleration(&self) -> Result<(), SubstrateError> {
        self.state().calls.host_acceleration_requests += 1;
        Ok(())
    }

    fn uses_ruby(&self) -> bool {
        self.ruby
    }

    fn set_mem_mode(&self, mode: MemMode) {
        self.state().calls.mem_mode = Some(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_swaps_in_order() {
        let substrate = RecordingSubstrate::new();
        substrate
            .perform_atomic_swap(&[(ModelId(0), ModelId(2))])
            .unwrap();
        substrate
            .perform_atomic_swap(&[(ModelId(2), ModelId(0))])
            .unwrap();

        let calls = substrate.calls();
        assert_eq!(calls.swaps.len(), 2);
        assert_eq!(calls.swaps[1], vec![(ModelId(2), ModelId(0))]);
    }

    #[test]
    fn test_armed_failure_fires_once() {
        let substrate = RecordingSubstrate::new();
        substrate.fail_next_swap("drain timeout");

        let err = substrate
            .perform_atomic_swap(&[(ModelId(0), ModelId(1))])
            .unwrap_err();
        assert_eq!(err, SubstrateError::swap_failed("drain timeout"));
        assert_eq!(substrate.swap_count(), 0);

        assert!(substrate.perform_atomic_swap(&[(ModelId(0), ModelId(1))]).is_ok());
        assert_eq!(substrate.swap_count(), 1);
    }

    #[test]
    fn test_armed_timeline_failure_fires_once() {
        let substrate = RecordingSubstrate::new();
        let busy = SubstrateError::TimelineInUse {
            timeline: TimelineIndex(1),
            owner: ModelId(9),
        };
        substrate.fail_next_timeline(busy.clone());

        assert_eq!(substrate.assign_timeline(ModelId(0), TimelineIndex(1)), Err(busy));
        assert!(substrate.calls().timelines.is_empty());
        assert!(substrate.assign_timeline(ModelId(0), TimelineIndex(1)).is_ok());
        assert_eq!(substrate.calls().timelines, vec![(ModelId(0), TimelineIndex(1))]);
    }

    #[test]
    fn test_board_defaults() {
        let substrate = RecordingSubstrate::new();
        assert!(!substrate.uses_ruby());
        assert!(RecordingSubstrate::new().with_ruby(true).uses_ruby());

        substrate.set_mem_mode(MemMode::Timing);
        assert_eq!(substrate.calls().mem_mode, Some(MemMode::Timing));
    }
}
