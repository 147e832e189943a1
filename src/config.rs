#[cfg(feature = "derive")]
use serde::{Deserialize, Serialize};

use crate::hash::DefaultKeyHasher;

pub const DEFAULT_REPLICAS: usize = 100;

/// Settings fixed when a ring is built.
///
/// * `num_replicas` - number of virtual nodes per real node, the same for every node (higher number means more even distribution of keys across all nodes, but more work per topology change)
/// * `hash_keys` - SipHash keys for the default hasher, `None` uses `(0, 0)`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "derive", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "derive", serde(default))]
pub struct RingConfig {
    pub num_replicas: usize,
    pub hash_keys: Option<(u64, u64)>,
}

impl Default for RingConfig {
    fn default() -> Self {
        RingConfig {
            num_replicas: DEFAULT_REPLICAS,
            hash_keys: None,
        }
    }
}

impl RingConfig {
    pub fn new(num_replicas: usize) -> RingConfig {
        RingConfig {
            num_replicas,
            ..Default::default()
        }
    }

    pub fn hasher(&self) -> DefaultKeyHasher {
        match self.hash_keys {
            Some((k0, k1)) => DefaultKeyHasher::with_keys(k0, k1),
            None => DefaultKeyHasher::default(),
        }
    }
}
