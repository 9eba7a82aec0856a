//! Query-string codec for log reads and entity writes.
//!
//! `history-items` requests carry:
//!
//! | parameter | meaning |
//! |---|---|
//! | `startAfterSequence` | exclusive lower bound, defaults to 0 |
//! | `order` | must be `sequence` when present |
//! | `ignoreOriginStoreId` | skip entries originated there |
//! | `filter.<field>` | equality in the single conjunctive condition |
//! | `filter.<n>.<field>` | equality in alternative `n` of a disjunction |
//! | `filter.<n>` | alternative `n` with no equality, matching everything |
//!
//! A single condition whose field names start with a number, or that tests
//! nothing, is sent in the indexed form.
//!
//! Filter values travel as text. See [`LogFilter`] for how text compares
//! with projection values.

use crate::entity::{WriteOptions, WriteSource};
use crate::error::{ProtocolError, ProtocolResult};
use crate::filter::{FilterCondition, LogFilter};
use crate::log::FindOptions;
use serde_json::Value;
use std::collections::BTreeMap;

/// Exclusive lower bound of a log read.
pub const START_AFTER: &str = "startAfterSequence";
/// Result ordering of a log read.
pub const ORDER: &str = "order";
/// The only supported ordering.
pub const ORDER_BY_SEQUENCE: &str = "sequence";
/// Origin excluded from a log read.
pub const IGNORE_ORIGIN: &str = "ignoreOriginStoreId";
/// Marker for a filter with no alternatives.
pub const FILTER: &str = "filter";
/// Prefix of filter parameters.
pub const FILTER_PREFIX: &str = "filter.";
/// Primary key of an entity route.
pub const ID: &str = "id";
/// Write source of an entity write.
pub const SOURCE: &str = "source";
/// Origin of an entity write.
pub const ORIGIN: &str = "originStoreId";
/// Upsert toggle of an entity write.
pub const CREATE_IF_MISSING: &str = "createIfMissing";

/// Encodes a log read starting strictly after `start_after`.
pub fn encode_find_query(start_after: u64, options: &FindOptions) -> Vec<(String, String)> {
    let mut pairs = vec![
        (ORDER.to_string(), ORDER_BY_SEQUENCE.to_string()),
        (START_AFTER.to_string(), start_after.to_string()),
    ];
    if let Some(origin) = &options.ignore_origin_store_id {
        pairs.push((IGNORE_ORIGIN.to_string(), origin.clone()));
    }
    if let Some(filter) = &options.filter {
        encode_filter(filter, &mut pairs);
    }
    pairs
}

fn encode_filter(filter: &LogFilter, pairs: &mut Vec<(String, String)>) {
    match filter.conditions() {
        [] => pairs.push((FILTER.to_string(), String::new())),
        [condition] if is_plain(condition) => {
            for (field, value) in condition.fields() {
                pairs.push((format!("{FILTER_PREFIX}{field}"), value_text(value)));
            }
        }
        conditions => {
            for (index, condition) in conditions.iter().enumerate() {
                if condition.is_empty() {
                    pairs.push((format!("{FILTER_PREFIX}{index}"), String::new()));
                }
                for (field, value) in condition.fields() {
                    pairs.push((format!("{FILTER_PREFIX}{index}.{field}"), value_text(value)));
                }
            }
        }
    }
}

/// Splits `<n>` or `<n>.<field>` into the alternative index and the field.
fn split_indexed(rest: &str) -> Option<(usize, Option<&str>)> {
    let (head, field) = match rest.split_once('.') {
        Some((head, field)) => (head, Some(field)),
        None => (rest, None),
    };
    head.parse().ok().map(|index| (index, field))
}

/// Returns `true` if the condition can travel as plain `filter.<field>`
/// keys without reading as indexed ones.
fn is_plain(condition: &FilterCondition) -> bool {
    !condition.is_empty() && condition.fields().all(|(field, _)| split_indexed(field).is_none())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Decodes a log read into its lower bound and options.
///
/// Parameters this codec does not know are ignored.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidQuery`] for a malformed bound, an
/// unsupported ordering or an empty filter field name.
pub fn decode_find_query(pairs: &[(String, String)]) -> ProtocolResult<(u64, FindOptions)> {
    let mut start_after = 0;
    let mut options = FindOptions::default();
    let mut has_filter = false;
    let mut plain: Option<FilterCondition> = None;
    let mut indexed: BTreeMap<usize, FilterCondition> = BTreeMap::new();

    for (key, value) in pairs {
        match key.as_str() {
            START_AFTER => {
                start_after = value
                    .parse()
                    .map_err(|_| ProtocolError::invalid_query(START_AFTER, "expected an integer"))?;
            }
            ORDER => {
                if value != ORDER_BY_SEQUENCE {
                    return Err(ProtocolError::invalid_query(
                        ORDER,
                        format!("unsupported ordering '{value}'"),
                    ));
                }
            }
            IGNORE_ORIGIN => options.ignore_origin_store_id = Some(value.clone()),
            FILTER => has_filter = true,
            _ => {
                let Some(rest) = key.strip_prefix(FILTER_PREFIX) else {
                    continue;
                };
                has_filter = true;
                let (condition, field) = match split_indexed(rest) {
                    Some((index, Some(field))) => (indexed.entry(index).or_default(), field),
                    Some((index, None)) => {
                        if !value.is_empty() {
                            return Err(ProtocolError::invalid_query(
                                key.clone(),
                                "an alternative marker takes no value",
                            ));
                        }
                        indexed.entry(index).or_default();
                        continue;
                    }
                    None => (plain.get_or_insert_with(FilterCondition::new), rest),
                };
                if field.is_empty() {
                    return Err(ProtocolError::invalid_query(key.clone(), "empty field name"));
                }
                condition.insert(field, value.clone());
            }
        }
    }

    if has_filter {
        options.filter = Some(LogFilter::any_of(plain.into_iter().chain(indexed.into_values())));
    }
    Ok((start_after, options))
}

/// Encodes the options of an entity write.
pub fn encode_write_options(options: &WriteOptions) -> Vec<(String, String)> {
    let mut pairs = vec![
        (SOURCE.to_string(), options.source.as_str().to_string()),
        (CREATE_IF_MISSING.to_string(), options.create_if_missing.to_string()),
    ];
    if let Some(origin) = &options.origin_store_id {
        pairs.push((ORIGIN.to_string(), origin.clone()));
    }
    pairs
}

/// Decodes the options of an entity write. Missing parameters keep their
/// defaults.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidQuery`] for an unknown source or a
/// non-boolean toggle.
pub fn decode_write_options(pairs: &[(String, String)]) -> ProtocolResult<WriteOptions> {
    let mut options = WriteOptions::default();
    for (key, value) in pairs {
        match key.as_str() {
            SOURCE => {
                options.source = value
                    .parse::<WriteSource>()
                    .map_err(|message| ProtocolError::invalid_query(SOURCE, message))?;
            }
            ORIGIN => options.origin_store_id = Some(value.clone()),
            CREATE_IF_MISSING => {
                options.create_if_missing = value.parse().map_err(|_| {
                    ProtocolError::invalid_query(CREATE_IF_MISSING, "expected a boolean")
                })?;
            }
            _ => {}
        }
    }
    Ok(options)
}

/// Returns the first value of `name`.
pub fn param<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}
