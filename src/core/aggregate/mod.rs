//! Line-item aggregation
//!
//! Groups medicine line items by type code, sums amounts and evaluates the
//! two export predicates per group. Also hosts the item-level predicates the
//! working-state engine decides on.

pub mod ordering;

use crate::domain::record::{ExportMark, LineItem};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use ordering::{order_groups, SortField, SortSpec};

/// Aggregation key of a line item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// Non-blank type code
    Code(String),
    /// Item without a type code, keyed by its own external id
    Ungrouped(i64),
}

impl GroupKey {
    pub fn of(item: &LineItem) -> Self {
        match item.body.group_code() {
            Some(code) => GroupKey::Code(code.to_string()),
            None => GroupKey::Ungrouped(item.external_id),
        }
    }
}

/// One group of line items sharing a type code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub type_code: Option<String>,
    pub type_name: Option<String>,
    pub unit_code: Option<String>,
    pub unit_name: Option<String>,
    pub total_amount: f64,
    pub member_external_ids: Vec<i64>,
    pub is_logically_exported: bool,
    pub logged_actor: Option<String>,
    pub logged_time: Option<i64>,
    pub is_actually_exported: bool,
    pub actual_actor: Option<String>,
    pub actual_time: Option<i64>,
    /// Every member agrees with the representative actor of each exported marker
    pub is_homogeneous: bool,
}

/// Whether every mark is complete; false for an empty set
fn all_complete<'a>(marks: impl IntoIterator<Item = &'a ExportMark>) -> bool {
    let mut any = false;
    for mark in marks {
        if !mark.is_complete() {
            return false;
        }
        any = true;
    }
    any
}

/// Item-level: every line item is logically exported (false when empty)
pub fn all_logically_exported(items: &[LineItem]) -> bool {
    all_complete(items.iter().map(|item| &item.body.logical_export))
}

/// Item-level: every line item is actually exported (false when empty)
pub fn all_actually_exported(items: &[LineItem]) -> bool {
    all_complete(items.iter().map(|item| &item.body.actual_export))
}

fn logical(item: &LineItem) -> &ExportMark {
    &item.body.logical_export
}

fn actual(item: &LineItem) -> &ExportMark {
    &item.body.actual_export
}

/// First member's mark when the predicate holds, else nothing
fn representative(
    members: &[&LineItem],
    mark: fn(&LineItem) -> &ExportMark,
) -> (bool, Option<String>, Option<i64>) {
    if !all_complete(members.iter().map(|item| mark(item))) {
        return (false, None, None);
    }
    match members.first() {
        Some(first) => {
            let first = mark(first);
            (true, first.actor.clone(), first.timestamp)
        }
        None => (false, None, None),
    }
}

fn first_present<F>(members: &[&LineItem], field: F) -> Option<String>
where
    F: Fn(&LineItem) -> Option<&String>,
{
    members.iter().find_map(|item| field(item).cloned())
}

fn summarize_group(members: &[&LineItem]) -> GroupSummary {
    let (is_logically_exported, logged_actor, logged_time) = representative(members, logical);
    let (is_actually_exported, actual_actor, actual_time) = representative(members, actual);

    let agrees = |exported: bool, actor: &Option<String>, mark: fn(&LineItem) -> &ExportMark| {
        !exported || members.iter().all(|item| &mark(item).actor == actor)
    };
    let is_homogeneous = agrees(is_logically_exported, &logged_actor, logical)
        && agrees(is_actually_exported, &actual_actor, actual);

    GroupSummary {
        type_code: first_present(members, |item| item.body.type_code.as_ref()),
        type_name: first_present(members, |item| item.body.type_name.as_ref()),
        unit_code: first_present(members, |item| item.body.unit_code.as_ref()),
        unit_name: first_present(members, |item| item.body.unit_name.as_ref()),
        total_amount: members
            .iter()
            .map(|item| item.body.amount.unwrap_or(0.0))
            .sum(),
        member_external_ids: members.iter().map(|item| item.external_id).collect(),
        is_logically_exported,
        logged_actor,
        logged_time,
        is_actually_exported,
        actual_actor,
        actual_time,
        is_homogeneous,
    }
}

/// Group line items by type code, in first-appearance order
pub fn group(items: &[LineItem]) -> Vec<GroupSummary> {
    let mut order: Vec<GroupKey> = Vec::new();
    let mut members: HashMap<GroupKey, Vec<&LineItem>> = HashMap::new();

    for item in items {
        let key = GroupKey::of(item);
        members
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(item);
    }

    order
        .iter()
        .filter_map(|key| members.get(key))
        .map(|group| summarize_group(group))
        .collect()
}

/// Group, then order by `order_by` (default `typeName`)
pub fn aggregate(items: &[LineItem], order_by: Option<&str>) -> Vec<GroupSummary> {
    let mut groups = group(items);
    order_groups(&mut groups, order_by);
    groups
}
