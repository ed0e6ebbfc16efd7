//! Group ordering
//!
//! Callers name a field (`typeName`, `-totalAmount`, ...). Unknown fields
//! leave the groups in first-appearance order.

use super::GroupSummary;
use std::cmp::Ordering;

/// Sortable group attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    TypeCode,
    TypeName,
    UnitCode,
    UnitName,
    TotalAmount,
}

impl SortField {
    /// Parse a field name, accepting camelCase and snake_case
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "typeCode" | "type_code" => Some(SortField::TypeCode),
            "typeName" | "type_name" => Some(SortField::TypeName),
            "unitCode" | "unit_code" => Some(SortField::UnitCode),
            "unitName" | "unit_name" => Some(SortField::UnitName),
            "totalAmount" | "total_amount" => Some(SortField::TotalAmount),
            _ => None,
        }
    }

    fn compare(self, a: &GroupSummary, b: &GroupSummary) -> Ordering {
        match self {
            SortField::TypeCode => a.type_code.cmp(&b.type_code),
            SortField::TypeName => a.type_name.cmp(&b.type_name),
            SortField::UnitCode => a.unit_code.cmp(&b.unit_code),
            SortField::UnitName => a.unit_name.cmp(&b.unit_name),
            SortField::TotalAmount => a.total_amount.total_cmp(&b.total_amount),
        }
    }
}

/// Parsed `order_by` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub descending: bool,
}

impl SortSpec {
    /// Parse `order_by`; `None` or blank means ascending `typeName`, an
    /// unknown field yields `None`
    pub fn parse(order_by: Option<&str>) -> Option<Self> {
        let raw = order_by.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Some(Self {
                field: SortField::TypeName,
                descending: false,
            });
        }

        let (name, descending) = match raw.strip_prefix('-') {
            Some(rest) => (rest.trim(), true),
            None => (raw, false),
        };
        SortField::parse(name).map(|field| Self { field, descending })
    }
}

/// Stable-sort groups in place
///
/// Absent values sort before present ones (after, when descending).
pub fn order_groups(groups: &mut [GroupSummary], order_by: Option<&str>) {
    let Some(spec) = SortSpec::parse(order_by) else {
        tracing::debug!(order_by = ?order_by, "Unknown sort field; keeping input order");
        return;
    };

    groups.sort_by(|a, b| {
        let ordering = spec.field.compare(a, b);
        if spec.descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}
