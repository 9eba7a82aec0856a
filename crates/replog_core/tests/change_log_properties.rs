//! Property tests for change-log coalescing and replay.

use proptest::prelude::*;
use replog_core::{ChangeLogConfig, Repository};
use replog_protocol::{Entity, FindOptions, WriteOptions};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
enum Op {
    Save { id: u8, value: i64 },
    Delete { id: u8 },
    Apply { id: u8, value: i64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..6, any::<i64>()).prop_map(|(id, value)| Op::Save { id, value }),
        2 => (0u8..6).prop_map(|id| Op::Delete { id }),
        1 => (0u8..6, any::<i64>()).prop_map(|(id, value)| Op::Apply { id, value }),
    ]
}

fn entity(id: u8, value: i64) -> Entity {
    Entity::new("items", format!("item-{id}")).with_field("value", value)
}

fn run(repo: &Repository, op: &Op) {
    match op {
        Op::Save { id, value } => repo.save(&entity(*id, *value), &WriteOptions::new()).unwrap(),
        Op::Delete { id } => {
            repo.delete(&format!("item-{id}"), &WriteOptions::new())
                .unwrap();
        }
        Op::Apply { id, value } => repo
            .save(&entity(*id, *value), &WriteOptions::replication_apply("peer"))
            .unwrap(),
    }
}

proptest! {
    #[test]
    fn at_most_one_pending_entry_per_entity(ops in prop::collection::vec(op(), 0..40)) {
        let repo = Repository::in_memory("props").with_change_log(ChangeLogConfig::default());
        for op in &ops {
            run(&repo, op);
        }

        let log = repo.change_log().unwrap();
        let page = log.find_entries_after(0, &FindOptions::new()).unwrap();

        let keys: HashSet<_> = page.items.iter().map(|e| e.primary_key.clone()).collect();
        prop_assert_eq!(keys.len(), page.items.len());

        let sequences: Vec<_> = page.items.iter().map(|e| e.sequence).collect();
        prop_assert!(sequences.windows(2).all(|w| w[0] < w[1]));

        let stats = log.statistics().unwrap();
        prop_assert_eq!(stats.sequence_index_count, page.items.len());
        prop_assert_eq!(stats.primary_key_index_count, page.items.len());
    }

    #[test]
    fn pending_entry_reflects_last_local_write(ops in prop::collection::vec(op(), 0..40)) {
        let repo = Repository::in_memory("props").with_change_log(ChangeLogConfig::default());
        let mut expected: HashMap<String, Option<bool>> = HashMap::new();
        for op in &ops {
            let existed_before = match op {
                Op::Delete { id } => repo.get_by_id(&format!("item-{id}")).unwrap().is_some(),
                _ => true,
            };
            run(&repo, op);
            match op {
                Op::Save { id, .. } => {
                    expected.insert(format!("item-{id}"), Some(false));
                }
                Op::Delete { id } if existed_before => {
                    expected.insert(format!("item-{id}"), Some(true));
                }
                Op::Delete { .. } => {}
                Op::Apply { id, .. } => {
                    expected.insert(format!("item-{id}"), None);
                }
            }
        }

        let page = repo
            .change_log()
            .unwrap()
            .find_entries_after(0, &FindOptions::new())
            .unwrap();
        let actual: HashMap<String, bool> =
            page.items.into_iter().map(|e| (e.primary_key, e.is_deleted)).collect();
        let expected: HashMap<String, bool> =
            expected.into_iter().filter_map(|(k, v)| v.map(|d| (k, d))).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn reads_are_idempotent(ops in prop::collection::vec(op(), 0..30), after in 0u64..20) {
        let repo = Repository::in_memory("props").with_change_log(ChangeLogConfig::default());
        for op in &ops {
            run(&repo, op);
        }
        let log = repo.change_log().unwrap();
        let first = log.find_entries_after(after, &FindOptions::new()).unwrap();
        let second = log.find_entries_after(after, &FindOptions::new()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn replicated_writes_never_advance_the_log(ids in prop::collection::vec(0u8..6, 1..20)) {
        let repo = Repository::in_memory("props").with_change_log(ChangeLogConfig::default());
        repo.save(&entity(0, 0), &WriteOptions::new()).unwrap();
        let log = repo.change_log().unwrap();
        let before = log.cursor().unwrap().last_log_sequence;

        for id in &ids {
            repo.save(&entity(*id, 1), &WriteOptions::replication_apply("peer")).unwrap();
            prop_assert_eq!(log.pending_sequence(&format!("item-{id}")).unwrap(), None);
        }

        prop_assert_eq!(log.cursor().unwrap().last_log_sequence, before);
    }
}
