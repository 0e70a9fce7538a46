//! Consumer-side progress tracking.
//!
//! Delivery is at-least-once. A consumer keeps a [`StreamCursor`] per
//! subscription and skips envelopes at or below the last applied sequence.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    #[error("non-monotonic sequence (last applied {last}, found {found})")]
    NonMonotonic { last: u64, found: u64 },
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct StreamCursor {
    last_sequence_number: Option<u64>,
}

impl StreamCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sequence_number(&self) -> Option<u64> {
        self.last_sequence_number
    }

    /// Accept `sequence_number` if it is newer than anything applied so far.
    pub fn advance(&mut self, sequence_number: u64) -> Result<(), CursorError> {
        if let Some(last) = self.last_sequence_number {
            if sequence_number <= last {
                return Err(CursorError::NonMonotonic {
                    last,
                    found: sequence_number,
                });
            }
        }
        self.last_sequence_number = Some(sequence_number);
        Ok(())
    }
}
