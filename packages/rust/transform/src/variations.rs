//! Variation splitting: weighted traffic allocation across message variants.
//!
//! Control variants are dropped first. One remaining variant fills the
//! channel's default slot; several fill numbered slots (`PREFIX_1`, …) and
//! share 100% by integer division, the last one taking the remainder.

use std::collections::BTreeMap;
use std::future::Future;

use tracing::debug;

use migrator_shared::{MessagingVariation, MigratorError, Result, VariationContent};

/// Total traffic share across a channel's variants.
pub const TOTAL_WEIGHT: u32 = 100;

/// One variant's processed content and traffic share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedContent<T> {
    pub weight: u32,
    pub content: T,
}

/// The split result for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantSplit<T> {
    /// A single variant in the unnumbered default slot.
    Single(T),
    /// Two or more variants, in source order.
    Numbered(Vec<WeightedContent<T>>),
}

impl<T> VariantSplit<T> {
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Numbered(variants) => variants.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Numbered(_))
    }

    /// Variant number (as a string) to weight.
    pub fn weights(&self) -> BTreeMap<String, u32> {
        match self {
            Self::Single(_) => BTreeMap::from([("1".to_string(), TOTAL_WEIGHT)]),
            Self::Numbered(variants) => variants
                .iter()
                .enumerate()
                .map(|(i, v)| ((i + 1).to_string(), v.weight))
                .collect(),
        }
    }

    /// Slot key and content per variant: `PREFIX` alone, or `PREFIX_1..N`.
    pub fn into_slots(self, prefix: &str) -> Vec<(String, WeightedContent<T>)> {
        match self {
            Self::Single(content) => vec![(
                prefix.to_string(),
                WeightedContent {
                    weight: TOTAL_WEIGHT,
                    content,
                },
            )],
            Self::Numbered(variants) => variants
                .into_iter()
                .enumerate()
                .map(|(i, v)| (format!("{prefix}_{}", i + 1), v))
                .collect(),
        }
    }
}

/// Traffic shares for `n` variants: `100 / n` each, remainder to the last.
pub fn allocate_weights(n: usize) -> Vec<u32> {
    if n == 0 {
        return Vec::new();
    }
    let n32 = n as u32;
    let base = TOTAL_WEIGHT / n32;
    let remainder = TOTAL_WEIGHT % n32;

    let mut weights = vec![base; n];
    if let Some(last) = weights.last_mut() {
        *last += remainder;
    }
    weights
}

/// Split the non-control variants selected by `select`, running each
/// through `process` in source order, one at a time.
///
/// Fails with [`MigratorError::NoVariations`] when nothing deliverable remains.
pub async fn split<'a, V, T, S, F, Fut>(
    channel: &str,
    variations: &'a [MessagingVariation],
    select: S,
    mut process: F,
) -> Result<VariantSplit<T>>
where
    V: 'a,
    S: Fn(&'a VariationContent) -> Option<&'a V>,
    F: FnMut(&'a V) -> Fut,
    Fut: Future<Output = T>,
{
    let deliverable: Vec<&'a V> = variations
        .iter()
        .filter(|v| !v.is_control)
        .filter_map(|v| select(&v.content))
        .collect();

    if deliverable.is_empty() {
        return Err(MigratorError::NoVariations {
            channel: channel.to_string(),
        });
    }

    debug!(channel, count = deliverable.len(), "splitting variations");

    if deliverable.len() == 1 {
        return Ok(VariantSplit::Single(process(deliverable[0]).await));
    }

    let weights = allocate_weights(deliverable.len());
    let mut processed = Vec::with_capacity(deliverable.len());
    for (variant, weight) in deliverable.into_iter().zip(weights) {
        processed.push(WeightedContent {
            weight,
            content: process(variant).await,
        });
    }

    Ok(VariantSplit::Numbered(processed))
}
