//! Confidence ranking and the background/foreground partition of a pixel's
//! components.

use super::component::Component;
use super::MAX_COMPONENTS;

/// Components of a pixel ordered by descending confidence, with the rank of
/// the last component that belongs to the background set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranking {
    order: [u8; MAX_COMPONENTS],
    len: u8,
    cutoff: u8,
}

impl Ranking {
    /// Ranks `components` by `weight / sqrt(variance)` and finds the first
    /// rank at which the cumulative weight reaches `beta`.
    pub fn compute(components: &[Component], beta: f32) -> Self {
        let len = components.len();
        debug_assert!(len > 0 && len <= MAX_COMPONENTS);

        let mut scores = [0.0f32; MAX_COMPONENTS];
        let mut order = [0u8; MAX_COMPONENTS];
        for (index, component) in components.iter().enumerate() {
            scores[index] = component.confidence();
            order[index] = index as u8;
        }

        // Insertion sort: stable, so equal scores keep index order.
        for i in 1..len {
            let mut j = i;
            while j > 0 && scores[order[j] as usize] > scores[order[j - 1] as usize] {
                order.swap(j, j - 1);
                j -= 1;
            }
        }

        // Normalized weights may sum to a few ulps under one.
        let threshold = beta - f32::EPSILON * len as f32;
        let mut cumulative = 0.0;
        let mut cutoff = None;
        for (rank, &index) in order[..len].iter().enumerate() {
            cumulative += components[index as usize].weight;
            if cumulative >= threshold {
                cutoff = Some(rank);
                break;
            }
        }

        Self {
            order,
            len: len as u8,
            cutoff: cutoff.unwrap_or(len.saturating_sub(2)) as u8,
        }
    }

    /// Component indices, most confident first.
    pub fn order(&self) -> &[u8] {
        &self.order[..self.len as usize]
    }

    /// Rank of the last background component (`b`).
    pub fn cutoff(&self) -> usize {
        self.cutoff as usize
    }

    /// Rank of component `index` in the sorted order.
    pub fn rank_of(&self, index: usize) -> usize {
        self.order()
            .iter()
            .position(|&n| n as usize == index)
            .unwrap_or(self.len as usize)
    }

    pub fn is_background(&self, index: usize) -> bool {
        self.rank_of(index) <= self.cutoff()
    }

    /// Most confident component index.
    pub fn strongest(&self) -> usize {
        self.order[0] as usize
    }

    pub fn background_set(&self) -> BackgroundSet {
        let mut bits = 0u16;
        for &index in &self.order()[..=self.cutoff()] {
            bits |= 1 << index;
        }
        BackgroundSet(bits)
    }
}

/// Compact membership set of a pixel's background components, one bit per
/// component index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackgroundSet(u16);

impl BackgroundSet {
    pub fn contains(self, index: usize) -> bool {
        index < MAX_COMPONENTS && self.0 & (1 << index) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}
