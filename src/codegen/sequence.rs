//! Ordering of location lifecycle calls.
//!
//! Init runs forward and records how far it got in `init_level`; cleanup
//! runs backward and only touches locations whose init was started. The
//! level of location `i` is `i + 1` in both directions.
//!
//! The level is set before the init call, so when init of location `k`
//! fails, cleanup runs for `k` and every location before it, never for
//! the ones after. Extension cleanups must tolerate a partial init.

/// A call in a generated block, tagged with its init level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCall<'a> {
    pub level: usize,
    pub location: &'a str,
}

/// Ordered call plan over the callable locations.
#[derive(Debug, Clone)]
pub struct CallPlan<'a> {
    locations: Vec<&'a str>,
}

impl<'a> CallPlan<'a> {
    pub fn new<I>(locations: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            locations: locations.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Prototype and retrieve order.
    pub fn forward(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.locations.iter().copied()
    }

    /// Publish order.
    pub fn reverse(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.locations.iter().rev().copied()
    }

    pub fn init_calls(&self) -> Vec<StagedCall<'a>> {
        self.locations
            .iter()
            .copied()
            .enumerate()
            .map(|(i, location)| StagedCall {
                level: i + 1,
                location,
            })
            .collect()
    }

    pub fn cleanup_calls(&self) -> Vec<StagedCall<'a>> {
        let mut calls = self.init_calls();
        calls.reverse();
        calls
    }
}
