//! Outcome of a completed estimation round.

use std::sync::Arc;

use planning_poker_core::error::DomainError;

use super::estimate::Estimate;
use super::message::MemberRef;

/// One estimation participant and what they played, if anything.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationEntry {
    member: MemberRef,
    estimate: Option<Estimate>,
}

impl EstimationEntry {
    #[must_use]
    pub fn member(&self) -> &MemberRef {
        &self.member
    }

    /// `None` when the participant did not submit before the round closed.
    #[must_use]
    pub fn estimate(&self) -> Option<Estimate> {
        self.estimate
    }
}

/// Per-member values of one round plus derived statistics.
///
/// Built while the round closes, then frozen with [`EstimationResult::freeze`]
/// before it is shared across participant queues.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationResult {
    entries: Vec<EstimationEntry>,
    read_only: bool,
}

impl EstimationResult {
    /// Creates a result with an empty slot for every member, in order.
    #[must_use]
    pub fn new(members: impl IntoIterator<Item = MemberRef>) -> Self {
        Self {
            entries: members
                .into_iter()
                .map(|member| EstimationEntry {
                    member,
                    estimate: None,
                })
                .collect(),
            read_only: false,
        }
    }

    /// Records what `member_name` played.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IllegalTransition` once the result is read-only
    /// and `DomainError::Validation` if the member has no slot.
    pub fn set_estimate(
        &mut self,
        member_name: &str,
        estimate: Option<Estimate>,
    ) -> Result<(), DomainError> {
        if self.read_only {
            return Err(DomainError::IllegalTransition(
                "estimation result is read-only".to_owned(),
            ));
        }

        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.member.name() == member_name)
            .ok_or_else(|| {
                DomainError::Validation(format!(
                    "{member_name} is not part of this estimation result"
                ))
            })?;
        entry.estimate = estimate;
        Ok(())
    }

    /// Locks the result against further changes.
    pub fn set_read_only(&mut self) {
        self.read_only = true;
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Locks the result and wraps it for sharing between queues.
    #[must_use]
    pub fn freeze(mut self) -> Arc<Self> {
        self.set_read_only();
        Arc::new(self)
    }

    #[must_use]
    pub fn entries(&self) -> &[EstimationEntry] {
        &self.entries
    }

    /// What `member_name` played, if they are in the result and submitted.
    #[must_use]
    pub fn estimate_of(&self, member_name: &str) -> Option<Estimate> {
        self.entries
            .iter()
            .find(|entry| entry.member.name() == member_name)
            .and_then(EstimationEntry::estimate)
    }

    fn numeric_values(&self) -> Vec<f64> {
        self.entries
            .iter()
            .filter_map(|entry| entry.estimate.and_then(Estimate::numeric))
            .collect()
    }

    /// Sum of all finite submitted values.
    #[must_use]
    pub fn sum(&self) -> Option<f64> {
        let values = self.numeric_values();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum())
    }

    /// Mean of all finite submitted values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> Option<f64> {
        let values = self.numeric_values();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Median of all finite submitted values; the mean of the middle two for
    /// an even count.
    #[must_use]
    pub fn median(&self) -> Option<f64> {
        let mut values = self.numeric_values();
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);
        let middle = values.len() / 2;
        if values.len() % 2 == 0 {
            Some(f64::midpoint(values[middle - 1], values[middle]))
        } else {
            Some(values[middle])
        }
    }
}
