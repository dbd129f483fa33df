//! Greedy newest-first packing of conversation history into a byte budget.

use paychat_types::{
    Message, OptimizationNotice, BYTES_PER_TOKEN_ESTIMATE, HISTORY_SAFETY_MARGIN, MAX_REQUEST_SIZE,
};

use crate::error::{ChatError, Result};

/// History selected for one request
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetOutcome {
    /// Chronological suffix of the input list
    pub history: Vec<Message>,
    /// Present only when messages were dropped
    pub notice: Option<OptimizationNotice>,
}

/// Selects the longest suffix of a message list that fits a byte budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryBudgeter {
    total_budget: usize,
    safety_margin: usize,
}

impl Default for HistoryBudgeter {
    fn default() -> Self {
        Self::new(MAX_REQUEST_SIZE, HISTORY_SAFETY_MARGIN)
    }
}

impl HistoryBudgeter {
    pub fn new(total_budget: usize, safety_margin: usize) -> Self {
        Self { total_budget, safety_margin }
    }

    pub fn total_budget(&self) -> usize {
        self.total_budget
    }

    /// Bytes left for history once the fixed payload and margin are paid for.
    pub fn available(&self, fixed_payload_size: usize) -> Result<usize> {
        match self
            .total_budget
            .checked_sub(fixed_payload_size)
            .and_then(|rest| rest.checked_sub(self.safety_margin))
        {
            Some(available) if available > 0 => Ok(available),
            _ => Err(ChatError::BaseRequestTooLarge {
                size: fixed_payload_size,
                limit: self.total_budget,
            }),
        }
    }

    /// Keep as many of the most recent messages as fit.
    ///
    /// `fixed_payload_size` is the serialized size of the request with an
    /// empty history. Each kept message costs its JSON size plus one
    /// separator byte when it is not the only element. Older context is
    /// dropped before newer context and messages are never cut.
    pub fn fit(&self, history: &[Message], fixed_payload_size: usize) -> Result<BudgetOutcome> {
        let available = self.available(fixed_payload_size)?;

        let mut used = 0usize;
        let mut kept: Vec<Message> = Vec::new();
        for message in history.iter().rev() {
            let separator = usize::from(!kept.is_empty());
            let size = message.serialized_size() + separator;
            if used + size > available {
                break;
            }
            used += size;
            kept.push(message.clone());
        }
        kept.reverse();

        let original_count = history.len();
        let kept_count = kept.len();
        let notice = (kept_count < original_count).then(|| {
            let dropped_bytes: usize = history[..original_count - kept_count]
                .iter()
                .map(Message::serialized_size)
                .sum();
            if kept_count == 0 {
                log::warn!("History budget of {} bytes fits no messages", available);
            }
            OptimizationNotice {
                original_count,
                kept_count,
                estimated_tokens_saved: (dropped_bytes / BYTES_PER_TOKEN_ESTIMATE) as u64,
                updated_count: None,
            }
        });

        Ok(BudgetOutcome { history: kept, notice })
    }
}
