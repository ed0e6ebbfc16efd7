//! Entity shapes
//!
//! An [`EntityShape`] tells the generic upsert store which table a record
//! lives in, which HIS keys carry its ids, and how a HIS payload maps onto
//! its body. There is one shape per entity kind.

use crate::domain::ids::EntityKind;
use crate::domain::payload::{self, FieldUpdate, HisPayload};
use crate::domain::record::{DescriptiveFields, LineItemBody};
use crate::domain::wire;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Number, Value};
use std::fmt::Debug;
use uuid::Uuid;

/// HIS key holding a record's own external id
pub const ID_KEY: &str = "ID";

/// HIS key holding the owning parent's external id
pub const PARENT_KEY: &str = "PARENT_ID";

/// Mapping from a HIS payload onto one entity kind
pub trait EntityShape: Send + Sync + 'static {
    /// Persisted body
    type Body: Clone + Debug + Default + Serialize + DeserializeOwned + Send + Sync;

    /// Partial update read from a payload
    type Patch: Debug + Send + Sync;

    /// Table the shape is stored in
    const KIND: EntityKind;

    /// Read the body fields present in `payload`
    fn patch_from_his(payload: &HisPayload) -> Self::Patch;

    /// Apply a partial update to a body
    fn apply_patch(body: &mut Self::Body, patch: Self::Patch);
}

/// A partial update: parent reference plus shape-specific fields
#[derive(Debug)]
pub struct RecordPatch<P> {
    pub parent_external_id: FieldUpdate<i64>,
    /// Cached parent local id to store alongside the reference, when known
    pub parent_local_id: Option<Uuid>,
    pub body: P,
}

impl<P> RecordPatch<P> {
    /// Read a full patch for shape `S` from a HIS payload
    pub fn from_his<S>(payload: &HisPayload) -> Self
    where
        S: EntityShape<Patch = P>,
    {
        let parent_external_id = if S::KIND.requires_parent() {
            FieldUpdate::read(payload, PARENT_KEY, |v| wire::decode(Some(v)))
        } else {
            FieldUpdate::Absent
        };

        Self {
            parent_external_id,
            parent_local_id: None,
            body: S::patch_from_his(payload),
        }
    }

    /// Attach a known parent local id
    pub fn with_parent_local_id(mut self, parent_local_id: Option<Uuid>) -> Self {
        self.parent_local_id = parent_local_id;
        self
    }
}

/// How a HIS value is converted before it is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
}

/// One entry of a descriptive field map
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub his_key: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

const fn field(his_key: &'static str, column: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        his_key,
        column,
        kind,
    }
}

/// Cabinet replenishment header
pub const CABINET_FIELDS: &[FieldSpec] = &[
    field("APPLY_NO", "apply_no", FieldKind::Text),
    field("CABINET_CODE", "cabinet_code", FieldKind::Text),
    field("CABINET_NAME", "cabinet_name", FieldKind::Text),
    field("DEPT_CODE", "dept_code", FieldKind::Text),
    field("DEPT_NAME", "dept_name", FieldKind::Text),
    field("APPLY_USER", "apply_user", FieldKind::Text),
    field("APPLY_TIME", "apply_time", FieldKind::Integer),
    field("STATUS", "status", FieldKind::Integer),
    field("REMARK", "remark", FieldKind::Text),
];

/// Other export record header
pub const OTHER_FIELDS: &[FieldSpec] = &[
    field("EXPORT_NO", "export_no", FieldKind::Text),
    field("EXPORT_TYPE", "export_type", FieldKind::Text),
    field("DEPT_CODE", "dept_code", FieldKind::Text),
    field("DEPT_NAME", "dept_name", FieldKind::Text),
    field("TARGET_DEPT_CODE", "target_dept_code", FieldKind::Text),
    field("TARGET_DEPT_NAME", "target_dept_name", FieldKind::Text),
    field("APPLY_USER", "apply_user", FieldKind::Text),
    field("APPLY_TIME", "apply_time", FieldKind::Integer),
    field("TOTAL_COST", "total_cost", FieldKind::Decimal),
    field("REMARK", "remark", FieldKind::Text),
];

/// Inpatient aggregate (ward summary) header
pub const INPATIENT_PARENT_FIELDS: &[FieldSpec] = &[
    field("SUMMARY_NO", "summary_no", FieldKind::Text),
    field("WARD_CODE", "ward_code", FieldKind::Text),
    field("WARD_NAME", "ward_name", FieldKind::Text),
    field("DEPT_CODE", "dept_code", FieldKind::Text),
    field("DEPT_NAME", "dept_name", FieldKind::Text),
    field("APPLY_USER", "apply_user", FieldKind::Text),
    field("APPLY_TIME", "apply_time", FieldKind::Integer),
    field("REMARK", "remark", FieldKind::Text),
];

/// Per-patient inpatient record
pub const INPATIENT_CHILD_FIELDS: &[FieldSpec] = &[
    field("PATIENT_ID", "patient_id", FieldKind::Integer),
    field("PATIENT_NAME", "patient_name", FieldKind::Text),
    field("INPATIENT_NO", "inpatient_no", FieldKind::Text),
    field("BED_NO", "bed_no", FieldKind::Text),
    field("ORDER_NO", "order_no", FieldKind::Text),
    field("DEPT_CODE", "dept_code", FieldKind::Text),
    field("DEPT_NAME", "dept_name", FieldKind::Text),
    field("APPLY_TIME", "apply_time", FieldKind::Integer),
];

fn convert(kind: FieldKind, value: &Value) -> Option<Value> {
    match kind {
        FieldKind::Text => payload::text(value).map(Value::String),
        FieldKind::Integer => wire::decode(Some(value)).map(Value::from),
        FieldKind::Decimal => {
            wire::decode_decimal(Some(value)).and_then(|v| Number::from_f64(v).map(Value::Number))
        }
    }
}

/// Read every mapped field present in `payload`
pub fn descriptive_patch(
    payload: &HisPayload,
    fields: &[FieldSpec],
) -> Vec<(&'static str, FieldUpdate<Value>)> {
    fields
        .iter()
        .map(|spec| {
            let update = FieldUpdate::read(payload, spec.his_key, |v| convert(spec.kind, v));
            (spec.column, update)
        })
        .filter(|(_, update)| update.is_present())
        .collect()
}

/// Apply a descriptive patch; cleared fields are kept as `null`
pub fn apply_descriptive(
    body: &mut DescriptiveFields,
    patch: Vec<(&'static str, FieldUpdate<Value>)>,
) {
    for (column, update) in patch {
        match update {
            FieldUpdate::Absent => {}
            FieldUpdate::Clear => {
                body.insert(column.to_string(), Value::Null);
            }
            FieldUpdate::Set(value) => {
                body.insert(column.to_string(), value);
            }
        }
    }
}

pub type DescriptivePatch = Vec<(&'static str, FieldUpdate<Value>)>;

macro_rules! descriptive_shape {
    ($(#[$meta:meta])* $name:ident, $kind:expr, $fields:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl EntityShape for $name {
            type Body = DescriptiveFields;
            type Patch = DescriptivePatch;
            const KIND: EntityKind = $kind;

            fn patch_from_his(payload: &HisPayload) -> Self::Patch {
                descriptive_patch(payload, $fields)
            }

            fn apply_patch(body: &mut Self::Body, patch: Self::Patch) {
                apply_descriptive(body, patch)
            }
        }
    };
}

descriptive_shape!(
    /// Cabinet replenishment parent
    CabinetShape,
    EntityKind::Cabinet,
    CABINET_FIELDS
);
descriptive_shape!(
    /// Other export parent
    OtherShape,
    EntityKind::Other,
    OTHER_FIELDS
);
descriptive_shape!(
    /// Inpatient aggregate parent
    InpatientParentShape,
    EntityKind::InpatientParent,
    INPATIENT_PARENT_FIELDS
);
descriptive_shape!(
    /// Inpatient child owned by an aggregate
    InpatientChildShape,
    EntityKind::InpatientChild,
    INPATIENT_CHILD_FIELDS
);

/// Partial update of a line item
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemPatch {
    pub amount: FieldUpdate<f64>,
    pub type_code: FieldUpdate<String>,
    pub type_name: FieldUpdate<String>,
    pub unit_code: FieldUpdate<String>,
    pub unit_name: FieldUpdate<String>,
    pub specification: FieldUpdate<String>,
    pub logical_actor: FieldUpdate<String>,
    pub logical_time: FieldUpdate<i64>,
    pub actual_actor: FieldUpdate<String>,
    pub actual_time: FieldUpdate<i64>,
}

impl LineItemPatch {
    /// Read the line-item fields present in `payload`
    pub fn from_his(payload: &HisPayload) -> Self {
        let integer = |v: &Value| wire::decode(Some(v));
        Self {
            amount: FieldUpdate::read(payload, "AMOUNT", |v| wire::decode_decimal(Some(v))),
            type_code: FieldUpdate::read(payload, "TYPE_CODE", payload::text),
            type_name: FieldUpdate::read(payload, "TYPE_NAME", payload::text),
            unit_code: FieldUpdate::read(payload, "UNIT_CODE", payload::text),
            unit_name: FieldUpdate::read(payload, "UNIT_NAME", payload::text),
            specification: FieldUpdate::read(payload, "SPECIFICATION", payload::text),
            logical_actor: FieldUpdate::read(payload, "EXPORT_USER", payload::text),
            logical_time: FieldUpdate::read(payload, "EXPORT_TIME", integer),
            actual_actor: FieldUpdate::read(payload, "ACTUAL_EXPORT_USER", payload::text),
            actual_time: FieldUpdate::read(payload, "ACTUAL_EXPORT_TIME", integer),
        }
    }

    /// Apply to a stored body
    pub fn apply(self, body: &mut LineItemBody) {
        self.amount.apply_to(&mut body.amount);
        self.type_code.apply_to(&mut body.type_code);
        self.type_name.apply_to(&mut body.type_name);
        self.unit_code.apply_to(&mut body.unit_code);
        self.unit_name.apply_to(&mut body.unit_name);
        self.specification.apply_to(&mut body.specification);
        self.logical_actor.apply_to(&mut body.logical_export.actor);
        self.logical_time.apply_to(&mut body.logical_export.timestamp);
        self.actual_actor.apply_to(&mut body.actual_export.actor);
        self.actual_time.apply_to(&mut body.actual_export.timestamp);
    }
}

macro_rules! line_item_shape {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl EntityShape for $name {
            type Body = LineItemBody;
            type Patch = LineItemPatch;
            const KIND: EntityKind = $kind;

            fn patch_from_his(payload: &HisPayload) -> Self::Patch {
                LineItemPatch::from_his(payload)
            }

            fn apply_patch(body: &mut Self::Body, patch: Self::Patch) {
                patch.apply(body)
            }
        }
    };
}

line_item_shape!(
    /// Line item owned by a cabinet replenishment
    CabinetLineItemShape,
    EntityKind::CabinetLineItem
);
line_item_shape!(
    /// Line item owned by an other export record
    OtherLineItemShape,
    EntityKind::OtherLineItem
);
line_item_shape!(
    /// Line item owned by an inpatient child
    InpatientLineItemShape,
    EntityKind::InpatientLineItem
);
