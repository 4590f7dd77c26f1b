//! Estimate values and estimation decks.

use std::fmt;

use planning_poker_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// A single card a member can play.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Estimate {
    /// A finite story-point value.
    Value(f64),
    /// The "too big to estimate" card (∞).
    Infinity,
    /// The "no idea" card (?).
    Unknown,
}

impl Estimate {
    /// Returns the finite numeric value, if this card has one.
    #[must_use]
    pub fn numeric(self) -> Option<f64> {
        match self {
            Self::Value(value) if value.is_finite() => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) if (*value - 0.5).abs() < f64::EPSILON => f.write_str("½"),
            Self::Value(value) => write!(f, "{value}"),
            Self::Infinity => f.write_str("∞"),
            Self::Unknown => f.write_str("?"),
        }
    }
}

/// Predefined estimation decks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deck {
    /// 0, ½, 1, 2, 3, 5, 8, 13, 20, 40, 100, ∞, ?
    #[default]
    Standard,
    /// 0, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89, ∞, ?
    Fibonacci,
}

const STANDARD_VALUES: [f64; 11] = [0.0, 0.5, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 20.0, 40.0, 100.0];
const FIBONACCI_VALUES: [f64; 11] = [0.0, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0, 55.0, 89.0];

impl Deck {
    /// Returns the cards of this deck in display order.
    #[must_use]
    pub fn estimates(self) -> Vec<Estimate> {
        let values: &[f64] = match self {
            Self::Standard => &STANDARD_VALUES,
            Self::Fibonacci => &FIBONACCI_VALUES,
        };
        values
            .iter()
            .copied()
            .map(Estimate::Value)
            .chain([Estimate::Infinity, Estimate::Unknown])
            .collect()
    }
}

/// Checks that a custom deck is usable.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the deck is empty, holds a negative
/// or non-finite value, or repeats a card.
pub fn validate_deck(deck: &[Estimate]) -> Result<(), DomainError> {
    if deck.is_empty() {
        return Err(DomainError::Validation(
            "deck must contain at least one estimate".to_owned(),
        ));
    }

    for (index, estimate) in deck.iter().enumerate() {
        if let Estimate::Value(value) = estimate {
            if !value.is_finite() || *value < 0.0 {
                return Err(DomainError::Validation(format!(
                    "deck value {value} must be a finite, non-negative number"
                )));
            }
        }
        if deck[..index].contains(estimate) {
            return Err(DomainError::Validation(format!(
                "deck contains {estimate} more than once"
            )));
        }
    }

    Ok(())
}
