//! Random writes on both sides converge after one pass.

use proptest::prelude::*;
use replog_testkit::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn one_pass_converges(writes in arb_sided_writes(4, 24)) {
        let pair = ReplicatedPair::new();
        for (side, write) in &writes {
            match side {
                Side::Local => write.apply(&pair.local),
                Side::Remote => write.apply(&pair.remote),
            }
        }

        pair.run();
        prop_assert!(pair.is_converged());
        prop_assert!(pending_entries(&pair.local.repository).is_empty());
        prop_assert!(pair.run().is_empty());
    }

    #[test]
    fn interleaved_passes_converge(
        first in arb_sided_writes(4, 12),
        second in arb_sided_writes(4, 12),
    ) {
        let pair = ReplicatedPair::new();
        for batch in [&first, &second] {
            for (side, write) in batch {
                match side {
                    Side::Local => write.apply(&pair.local),
                    Side::Remote => write.apply(&pair.remote),
                }
            }
            pair.run();
            prop_assert!(pair.is_converged());
        }
        prop_assert!(pair.run().is_empty());
    }
}
