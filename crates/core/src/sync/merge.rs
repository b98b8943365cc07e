//! Training progress accumulation
//!
//! Progress updates for the same module and user collapse into one record
//! before submission. Field rules:
//!
//! | field | rule |
//! |---|---|
//! | `progress` | maximum |
//! | `timeSpent` | sum |
//! | `completedSections` | union, first-seen order |
//! | `timestamp` | most recent |
//!
//! Every other field comes from the newest operation in the group.

use std::cmp::Ordering;

use chrono::DateTime;
use serde_json::{Map, Value};
use shiftsync_domain::{Operation, OwnerContext};

/// One record replacing a group of operations
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub record: Value,
    pub source_ids: Vec<String>,
    pub owner: OwnerContext,
}

/// Group key: module plus user. Operations without a module merge alone.
fn merge_key(operation: &Operation) -> Option<(String, Option<String>)> {
    let payload = operation.payload.as_object()?;
    let module = scalar_text(payload.get("moduleId")?)?;
    let user = payload
        .get("userId")
        .and_then(scalar_text)
        .or_else(|| operation.owner.user_id.clone());
    Some((module, user))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Fold operations into merged records, preserving first-appearance order
pub fn merge_operations(operations: &[Operation]) -> Vec<MergedRecord> {
    let mut groups: Vec<(Option<(String, Option<String>)>, Vec<&Operation>)> = Vec::new();

    for operation in operations {
        let key = merge_key(operation);
        let slot = match &key {
            Some(_) => groups.iter_mut().find(|(existing, _)| existing == &key),
            None => None,
        };
        match slot {
            Some((_, members)) => members.push(operation),
            None => groups.push((key, vec![operation])),
        }
    }

    groups.into_iter().filter_map(|(_, members)| merge_group(&members)).collect()
}

fn merge_group(members: &[&Operation]) -> Option<MergedRecord> {
    let mut ordered: Vec<&Operation> = members.to_vec();
    ordered.sort_by_key(|op| op.created_at);

    let newest = *ordered.last()?;
    let mut record: Map<String, Value> = newest.payload.as_object().cloned().unwrap_or_default();

    let payloads: Vec<&Map<String, Value>> =
        ordered.iter().filter_map(|op| op.payload.as_object()).collect();

    if let Some(progress) = max_number(payloads.iter().filter_map(|p| p.get("progress"))) {
        record.insert("progress".into(), progress);
    }

    let spent: Vec<&Value> = payloads.iter().filter_map(|p| p.get("timeSpent")).collect();
    if !spent.is_empty() {
        record.insert("timeSpent".into(), sum_numbers(&spent));
    }

    let mut sections: Vec<Value> = Vec::new();
    let mut saw_sections = false;
    for payload in &payloads {
        if let Some(Value::Array(items)) = payload.get("completedSections") {
            saw_sections = true;
            for item in items {
                if !sections.contains(item) {
                    sections.push(item.clone());
                }
            }
        }
    }
    if saw_sections {
        record.insert("completedSections".into(), Value::Array(sections));
    }

    if let Some(timestamp) = latest_timestamp(payloads.iter().filter_map(|p| p.get("timestamp"))) {
        record.insert("timestamp".into(), timestamp);
    }

    Some(MergedRecord {
        record: Value::Object(record),
        source_ids: ordered.iter().map(|op| op.id.clone()).collect(),
        owner: newest.owner.clone(),
    })
}

fn max_number<'a>(values: impl Iterator<Item = &'a Value>) -> Option<Value> {
    values
        .filter(|v| v.is_number())
        .max_by(|a, b| {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        })
        .cloned()
}

fn sum_numbers(values: &[&Value]) -> Value {
    if values.iter().all(|v| v.is_i64() || v.is_u64()) {
        let total: i64 = values.iter().filter_map(|v| v.as_i64()).sum();
        return Value::from(total);
    }
    let total: f64 = values.iter().filter_map(|v| v.as_f64()).sum();
    Value::from(total)
}

/// Numbers compare numerically, RFC 3339 strings chronologically
fn latest_timestamp<'a>(values: impl Iterator<Item = &'a Value>) -> Option<Value> {
    values
        .filter_map(|v| timestamp_millis(v).map(|ms| (ms, v)))
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
        .map(|(_, v)| v.clone())
}

fn timestamp_millis(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp_millis() as f64)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;
    use shiftsync_domain::{OperationStatus, OperationType, Priority};

    use super::*;

    fn progress(id: &str, offset_secs: i64, payload: Value) -> Operation {
        let at = Utc::now() + Duration::seconds(offset_secs);
        Operation {
            id: id.to_string(),
            op_type: OperationType::TrainingProgress,
            priority: Priority::Medium,
            payload,
            created_at: at,
            updated_at: at,
            scheduled_for: None,
            retry_count: 0,
            max_retries: 5,
            last_attempt: None,
            status: OperationStatus::Processing,
            network_required: true,
            dependencies: Vec::new(),
            owner: OwnerContext { user_id: Some("u1".into()), ..Default::default() },
            last_error: None,
        }
    }

    #[test]
    fn same_module_accumulates() {
        let ops = vec![
            progress(
                "a",
                0,
                json!({"moduleId": "m1", "progress": 40, "timeSpent": 5,
                       "completedSections": ["intro"], "timestamp": "2026-01-01T10:00:00Z"}),
            ),
            progress(
                "b",
                1,
                json!({"moduleId": "m1", "progress": 70, "timeSpent": 8,
                       "completedSections": ["intro", "safety"], "timestamp": "2026-01-01T11:00:00Z"}),
            ),
        ];

        let merged = merge_operations(&ops);
        assert_eq!(merged.len(), 1);
        let record = &merged[0].record;
        assert_eq!(record["progress"], 70);
        assert_eq!(record["timeSpent"], 13);
        assert_eq!(record["completedSections"], json!(["intro", "safety"]));
        assert_eq!(record["timestamp"], "2026-01-01T11:00:00Z");
        assert_eq!(merged[0].source_ids, vec!["a", "b"]);
    }

    #[test]
    fn progress_is_max_not_latest() {
        let ops = vec![
            progress("a", 0, json!({"moduleId": "m1", "progress": 90})),
            progress("b", 1, json!({"moduleId": "m1", "progress": 30})),
        ];
        assert_eq!(merge_operations(&ops)[0].record["progress"], 90);
    }

    #[test]
    fn different_modules_stay_apart() {
        let ops = vec![
            progress("a", 0, json!({"moduleId": "m1", "progress": 10})),
            progress("b", 1, json!({"moduleId": "m2", "progress": 20})),
            progress("c", 2, json!({"moduleId": "m1", "progress": 30})),
        ];
        let merged = merge_operations(&ops);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source_ids, vec!["a", "c"]);
        assert_eq!(merged[1].source_ids, vec!["b"]);
    }

    #[test]
    fn different_users_stay_apart() {
        let ops = vec![
            progress("a", 0, json!({"moduleId": "m1", "userId": "u1"})),
            progress("b", 1, json!({"moduleId": "m1", "userId": "u2"})),
        ];
        assert_eq!(merge_operations(&ops).len(), 2);
    }

    #[test]
    fn operations_without_module_merge_alone() {
        let ops = vec![progress("a", 0, json!({"note": 1})), progress("b", 1, json!({"note": 2}))];
        assert_eq!(merge_operations(&ops).len(), 2);
    }
}
