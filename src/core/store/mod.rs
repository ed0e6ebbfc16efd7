//! Record upsert store
//!
//! One generic natural-key store ([`UpsertStore`]) parameterized by entity
//! shape ([`EntityShape`]), with a type alias per entity kind.

pub mod hierarchy;
pub mod shape;
pub mod upsert;

pub use shape::{
    CabinetLineItemShape, CabinetShape, EntityShape, InpatientChildShape, InpatientLineItemShape,
    InpatientParentShape, LineItemPatch, OtherLineItemShape, OtherShape, RecordPatch, ID_KEY,
    PARENT_KEY,
};
pub use upsert::UpsertStore;

pub type CabinetStore = UpsertStore<CabinetShape>;
pub type OtherStore = UpsertStore<OtherShape>;
pub type InpatientParentStore = UpsertStore<InpatientParentShape>;
pub type InpatientChildStore = UpsertStore<InpatientChildShape>;
pub type CabinetLineItemStore = UpsertStore<CabinetLineItemShape>;
pub type OtherLineItemStore = UpsertStore<OtherLineItemShape>;
pub type InpatientLineItemStore = UpsertStore<InpatientLineItemShape>;
