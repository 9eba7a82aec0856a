//! Property-based test generators using proptest.

use crate::fixtures::{person, LoopbackPeer};
use proptest::prelude::*;

/// Which side of a pair a write goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The synchronizer's own repository.
    Local,
    /// The peer.
    Remote,
}

/// An application write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    /// Save `people/<id>` with a name.
    Put {
        /// Primary key.
        id: String,
        /// Name field.
        name: String,
    },
    /// Delete `people/<id>`.
    Delete {
        /// Primary key.
        id: String,
    },
}

impl Write {
    /// Applies the write to `peer`.
    pub fn apply(&self, peer: &LoopbackPeer) {
        match self {
            Write::Put { id, name } => peer.save(person(id, name)),
            Write::Delete { id } => {
                peer.delete(id);
            }
        }
    }
}

/// Strategy for primary keys drawn from a small pool, so that writes
/// collide.
pub fn arb_id(pool: usize) -> impl Strategy<Value = String> {
    (0..pool).prop_map(|n| format!("p{n}"))
}

/// Strategy for a single write.
pub fn arb_write(pool: usize) -> impl Strategy<Value = Write> {
    prop_oneof![
        3 => (arb_id(pool), "[a-z]{1,6}").prop_map(|(id, name)| Write::Put { id, name }),
        1 => arb_id(pool).prop_map(|id| Write::Delete { id }),
    ]
}

/// Strategy for writes spread over both sides of a pair.
pub fn arb_sided_writes(pool: usize, max: usize) -> impl Strategy<Value = Vec<(Side, Write)>> {
    prop::collection::vec(
        (prop_oneof![Just(Side::Local), Just(Side::Remote)], arb_write(pool)),
        0..max,
    )
}
