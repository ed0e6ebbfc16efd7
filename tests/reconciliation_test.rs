//! End-to-end reconciliation against the in-memory backend

use async_trait::async_trait;
use medsync::adapters::catalog::StateCatalog;
use medsync::adapters::memory::MemoryBackend;
use medsync::core::notify::BroadcastNotifier;
use medsync::core::reconcile::SyncedChildren;
use medsync::core::service::{ReconciliationService, ServiceSettings};
use medsync::core::working_state::{EngineSettings, StateThresholds, TransitionReason};
use medsync::domain::{
    ActorId, CatalogError, EntityKind, Hierarchy, HisPayload, MedSyncError, Result,
    WorkingStateDescriptor,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const EXPORTED: i64 = 20;
const ACTUALLY_EXPORTED: i64 = 30;

/// Catalog that knows the two configured states, or fails every lookup
struct TestCatalog {
    failing: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl StateCatalog for TestCatalog {
    async fn describe(&self, id: i64) -> Result<WorkingStateDescriptor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(CatalogError::ServerError {
                status: 503,
                message: "maintenance".to_string(),
            }
            .into());
        }
        match id {
            EXPORTED | ACTUALLY_EXPORTED => Ok(serde_json::from_value(json!({
                "id": id,
                "code": format!("STATE_{id}"),
                "name": format!("State {id}"),
            }))
            .unwrap()),
            other => Err(CatalogError::StateNotFound(other).into()),
        }
    }
}

struct Harness {
    service: ReconciliationService,
    backend: Arc<MemoryBackend>,
    notifier: Arc<BroadcastNotifier>,
    catalog: Arc<TestCatalog>,
}

struct Options {
    thresholds: StateThresholds,
    evaluate_after_sync: bool,
    catalog_failing: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            thresholds: StateThresholds {
                all_exported: Some(EXPORTED),
                all_actually_exported: Some(ACTUALLY_EXPORTED),
            },
            evaluate_after_sync: false,
            catalog_failing: false,
        }
    }
}

fn harness(options: Options) -> Harness {
    let backend = Arc::new(MemoryBackend::new());
    let notifier = Arc::new(BroadcastNotifier::default());
    let catalog = Arc::new(TestCatalog {
        failing: options.catalog_failing,
        calls: AtomicUsize::new(0),
    });
    let settings = ServiceSettings {
        engine: EngineSettings {
            thresholds: options.thresholds,
            system_actor: ActorId::new("system").unwrap(),
            topic_prefix: "medsync".to_string(),
        },
        bulk_concurrency: 4,
        evaluate_after_sync: options.evaluate_after_sync,
    };
    let service = ReconciliationService::new(
        backend.clone(),
        catalog.clone(),
        notifier.clone(),
        settings,
    );

    Harness {
        service,
        backend,
        notifier,
        catalog,
    }
}

fn payload(value: Value) -> HisPayload {
    HisPayload::from_value(value).unwrap()
}

fn payloads(values: Vec<Value>) -> Vec<HisPayload> {
    values.into_iter().map(payload).collect()
}

fn actor() -> ActorId {
    ActorId::new("his-sync").unwrap()
}

fn item(id: i64, type_code: &str, amount: i64) -> Value {
    json!({"ID": id, "TYPE_CODE": type_code, "TYPE_NAME": type_code, "AMOUNT": amount})
}

fn exported_item(id: i64, type_code: &str, amount: i64) -> Value {
    let mut value = item(id, type_code, amount);
    value["EXPORT_USER"] = json!("nurse1");
    value["EXPORT_TIME"] = json!(1_700_000_000_000_i64);
    value
}

fn actually_exported_item(id: i64, type_code: &str, amount: i64) -> Value {
    let mut value = exported_item(id, type_code, amount);
    value["ACTUAL_EXPORT_USER"] = json!("pharmacist");
    value["ACTUAL_EXPORT_TIME"] = json!({"low": 1_000, "high": 396});
    value
}

#[tokio::test]
async fn test_repeat_upsert_merges_into_one_record() {
    let h = harness(Options::default());

    h.service
        .reconcile(
            Hierarchy::Cabinet,
            &payload(json!({"ID": 42, "DEPT_NAME": "ICU", "REMARK": "first"})),
            &[],
            &actor(),
        )
        .await
        .unwrap();
    let outcome = h
        .service
        .reconcile(
            Hierarchy::Cabinet,
            &payload(json!({"ID": 42, "REMARK": "second", "APPLY_USER": "dr.lee"})),
            &[],
            &actor(),
        )
        .await
        .unwrap();

    let parent = outcome.sync.parent;
    assert_eq!(parent.meta.version, 2);
    assert_eq!(parent.body["dept_name"], json!("ICU"));
    assert_eq!(parent.body["remark"], json!("second"));
    assert_eq!(parent.body["apply_user"], json!("dr.lee"));
    assert_eq!(h.backend.row_count(EntityKind::Cabinet).await, 1);
    assert!(matches!(outcome.sync.children, SyncedChildren::Unchanged));
}

#[tokio::test]
async fn test_split_word_ids_are_decoded_at_ingress() {
    let h = harness(Options::default());
    let high_id = 7 + (1_i64 << 32);

    let outcome = h
        .service
        .reconcile(
            Hierarchy::Other,
            &payload(json!({
                "ID": {"low": 7, "high": 1},
                "APPLY_TIME": {"lowWord": 5, "highWord": 0}
            })),
            &payloads(vec![item(1, "A", 1)]),
            &actor(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.sync.parent.external_id, high_id);
    assert_eq!(outcome.sync.parent.body["apply_time"], json!(5));

    let summary = h
        .service
        .summarize(Hierarchy::Other, high_id, None)
        .await
        .unwrap();
    assert_eq!(summary.groups.len(), 1);
}

#[tokio::test]
async fn test_groups_sum_amounts_per_type_code() {
    let h = harness(Options::default());

    h.service
        .reconcile(
            Hierarchy::Cabinet,
            &payload(json!({"ID": 1})),
            &payloads(vec![
                item(11, "A", 1),
                item(12, "B", 5),
                item(13, "A", 2),
                item(14, "A", 3),
            ]),
            &actor(),
        )
        .await
        .unwrap();

    let summary = h
        .service
        .summarize(Hierarchy::Cabinet, 1, Some("typeCode"))
        .await
        .unwrap();

    let totals: Vec<(Option<&str>, f64)> = summary
        .groups
        .iter()
        .map(|g| (g.type_code.as_deref(), g.total_amount))
        .collect();
    assert_eq!(totals, vec![(Some("A"), 6.0), (Some("B"), 5.0)]);
    assert_eq!(summary.groups[0].member_external_ids, vec![11, 13, 14]);

    let descending = h
        .service
        .summarize(Hierarchy::Cabinet, 1, Some("-totalAmount"))
        .await
        .unwrap();
    assert_eq!(descending.groups[0].type_code.as_deref(), Some("A"));
}

#[tokio::test]
async fn test_summary_of_partially_exported_group() {
    let h = harness(Options::default());

    h.service
        .reconcile(
            Hierarchy::Cabinet,
            &payload(json!({"ID": 1001, "DEPT_NAME": "Pharmacy"})),
            &payloads(vec![item(1, "PARA", 10), exported_item(2, "PARA", 5)]),
            &actor(),
        )
        .await
        .unwrap();

    let summary = h
        .service
        .summarize(Hierarchy::Cabinet, 1001, None)
        .await
        .unwrap();

    assert_eq!(summary.parent.external_id, 1001);
    assert!(summary.working_state.is_none());
    assert_eq!(summary.groups.len(), 1);
    let group = &summary.groups[0];
    assert_eq!(group.type_code.as_deref(), Some("PARA"));
    assert_eq!(group.total_amount, 15.0);
    assert!(!group.is_logically_exported);
    assert_eq!(group.logged_actor, None);
    assert_eq!(group.logged_time, None);
}

#[tokio::test]
async fn test_actual_export_takes_priority() {
    let h = harness(Options::default());
    let mut events = h.notifier.subscribe();

    h.service
        .reconcile(
            Hierarchy::Cabinet,
            &payload(json!({"ID": 5})),
            &payloads(vec![
                actually_exported_item(51, "A", 1),
                actually_exported_item(52, "B", 2),
            ]),
            &actor(),
        )
        .await
        .unwrap();

    let evaluation = h
        .service
        .evaluate_working_state(Hierarchy::Cabinet, 5)
        .await
        .unwrap();

    assert!(evaluation.updated);
    assert_eq!(evaluation.old_state, None);
    assert_eq!(evaluation.new_state, Some(ACTUALLY_EXPORTED));
    assert_eq!(evaluation.reason, TransitionReason::AllActualExported);

    let summary = evaluation.summary.unwrap();
    assert_eq!(summary.record.working_state_id, Some(ACTUALLY_EXPORTED));
    assert_eq!(summary.record.meta.version, 2);
    assert_eq!(summary.record.meta.updated_by, "system");
    assert_eq!(
        summary.working_state.map(|d| d.code),
        Some(format!("STATE_{ACTUALLY_EXPORTED}"))
    );

    let published = events.try_recv().unwrap();
    assert_eq!(published.topic, "medsync.cabinet.working_state_changed");
    assert_eq!(published.event.external_id, 5);
    assert_eq!(published.event.old_state, None);
    assert_eq!(published.event.new_state, Some(ACTUALLY_EXPORTED));
    assert_eq!(published.event.reason, TransitionReason::AllActualExported);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_no_regression_from_actually_exported() {
    let h = harness(Options::default());
    let parent = payload(json!({"ID": 6}));

    h.service
        .reconcile(
            Hierarchy::Other,
            &parent,
            &payloads(vec![actually_exported_item(61, "A", 1)]),
            &actor(),
        )
        .await
        .unwrap();
    let first = h
        .service
        .evaluate_working_state(Hierarchy::Other, 6)
        .await
        .unwrap();
    assert_eq!(first.new_state, Some(ACTUALLY_EXPORTED));

    // HIS now reports the item as only logically exported
    h.service
        .reconcile(
            Hierarchy::Other,
            &parent,
            &payloads(vec![exported_item(61, "A", 1)]),
            &actor(),
        )
        .await
        .unwrap();
    let second = h
        .service
        .evaluate_working_state(Hierarchy::Other, 6)
        .await
        .unwrap();

    assert!(!second.updated);
    assert_eq!(second.reason, TransitionReason::NoStateChangeNeeded);
    assert_eq!(second.old_state, Some(ACTUALLY_EXPORTED));
    assert_eq!(second.new_state, Some(ACTUALLY_EXPORTED));
}

#[tokio::test]
async fn test_sync_never_touches_working_state() {
    let h = harness(Options::default());
    let parent = payload(json!({"ID": 8}));

    h.service
        .reconcile(
            Hierarchy::Cabinet,
            &parent,
            &payloads(vec![exported_item(81, "A", 1)]),
            &actor(),
        )
        .await
        .unwrap();
    h.service
        .evaluate_working_state(Hierarchy::Cabinet, 8)
        .await
        .unwrap();

    let outcome = h
        .service
        .reconcile(Hierarchy::Cabinet, &parent, &[], &actor())
        .await
        .unwrap();
    assert_eq!(outcome.sync.parent.working_state_id, Some(EXPORTED));
    assert_eq!(outcome.sync.parent.meta.version, 3);
}

#[tokio::test]
async fn test_evaluation_outcomes_without_transition() {
    let h = harness(Options::default());

    let missing = h
        .service
        .evaluate_working_state(Hierarchy::Inpatient, 404)
        .await
        .unwrap();
    assert!(!missing.updated);
    assert_eq!(missing.reason, TransitionReason::ParentNotFound);

    h.service
        .reconcile(Hierarchy::Cabinet, &payload(json!({"ID": 9})), &[], &actor())
        .await
        .unwrap();
    let empty = h
        .service
        .evaluate_working_state(Hierarchy::Cabinet, 9)
        .await
        .unwrap();
    assert_eq!(empty.reason, TransitionReason::NoMedicines);
    assert!(empty.summary.is_none());
}

#[tokio::test]
async fn test_disabled_thresholds_never_transition() {
    let h = harness(Options {
        thresholds: StateThresholds {
            all_exported: None,
            all_actually_exported: None,
        },
        ..Options::default()
    });

    h.service
        .reconcile(
            Hierarchy::Cabinet,
            &payload(json!({"ID": 10})),
            &payloads(vec![actually_exported_item(101, "A", 1)]),
            &actor(),
        )
        .await
        .unwrap();
    let evaluation = h
        .service
        .evaluate_working_state(Hierarchy::Cabinet, 10)
        .await
        .unwrap();

    assert!(!evaluation.updated);
    assert_eq!(evaluation.reason, TransitionReason::NoStateChangeNeeded);
}

#[tokio::test]
async fn test_bulk_sync_isolates_failures() {
    let h = harness(Options::default());
    h.service
        .reconcile(Hierarchy::Other, &payload(json!({"ID": 1001})), &[], &actor())
        .await
        .unwrap();

    let mut items: Vec<Value> = (1..=5)
        .map(|id| {
            let mut value = item(id, "PARA", 1);
            value["PARENT_ID"] = json!(1001);
            value
        })
        .collect();
    items[2]["ID"] = json!("not-an-id");

    let report = h
        .service
        .sync_line_items(Hierarchy::Other, &payloads(items), &actor())
        .await;

    assert_eq!(report.attempted, 5);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].index, 2);
    assert_eq!(report.failures[0].code, "field_invalid");

    let mut stored: Vec<i64> = h
        .backend
        .rows(EntityKind::OtherLineItem)
        .await
        .into_iter()
        .map(|row| row.external_id)
        .collect();
    stored.sort_unstable();
    assert_eq!(stored, vec![1, 2, 4, 5]);

    let parent_local = h
        .service
        .summarize(Hierarchy::Other, 1001, None)
        .await
        .unwrap()
        .parent
        .local_id;
    assert!(h
        .backend
        .rows(EntityKind::OtherLineItem)
        .await
        .iter()
        .all(|row| row.parent_local_id == Some(parent_local)));
}

#[tokio::test]
async fn test_failed_sync_rolls_back_everything() {
    let h = harness(Options::default());
    let parent = payload(json!({"ID": 12, "REMARK": "original"}));

    h.service
        .reconcile(
            Hierarchy::Cabinet,
            &parent,
            &payloads(vec![item(121, "A", 1), item(122, "B", 1)]),
            &actor(),
        )
        .await
        .unwrap();

    let err = h
        .service
        .reconcile(
            Hierarchy::Cabinet,
            &payload(json!({"ID": 12, "REMARK": "changed"})),
            &payloads(vec![item(123, "C", 1), json!({"TYPE_CODE": "D"})]),
            &actor(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MedSyncError::FieldInvalid { .. }));

    let summary = h
        .service
        .summarize(Hierarchy::Cabinet, 12, None)
        .await
        .unwrap();
    assert_eq!(summary.parent.body["remark"], json!("original"));
    assert_eq!(summary.parent.meta.version, 1);
    let codes: Vec<_> = summary
        .groups
        .iter()
        .filter_map(|g| g.type_code.clone())
        .collect();
    assert_eq!(codes, vec!["A".to_string(), "B".to_string()]);
}

#[tokio::test]
async fn test_children_are_replaced_not_merged() {
    let h = harness(Options::default());
    let parent = payload(json!({"ID": 13}));

    h.service
        .reconcile(
            Hierarchy::Cabinet,
            &parent,
            &payloads(vec![item(131, "A", 1), item(132, "A", 1)]),
            &actor(),
        )
        .await
        .unwrap();
    let outcome = h
        .service
        .reconcile(
            Hierarchy::Cabinet,
            &parent,
            &payloads(vec![item(133, "A", 4)]),
            &actor(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.sync.children.len(), 1);
    assert_eq!(h.backend.row_count(EntityKind::CabinetLineItem).await, 1);
}

#[tokio::test]
async fn test_inpatient_unions_line_items_across_children() {
    let h = harness(Options::default());

    let outcome = h
        .service
        .reconcile(
            Hierarchy::Inpatient,
            &payload(json!({"ID": 500, "WARD_NAME": "Ward 3"})),
            &payloads(vec![
                json!({"ID": 501, "PATIENT_NAME": "A"}),
                json!({"ID": 502, "PATIENT_NAME": "B"}),
            ]),
            &actor(),
        )
        .await
        .unwrap();
    match &outcome.sync.children {
        SyncedChildren::Children(children) => {
            assert_eq!(children.len(), 2);
            assert!(children
                .iter()
                .all(|c| c.parent_local_id == Some(outcome.sync.parent.local_id)));
        }
        other => panic!("unexpected children {other:?}"),
    }

    let items: Vec<Value> = vec![
        (1, 501, "PARA", 2),
        (2, 502, "PARA", 3),
        (3, 502, "IBU", 1),
    ]
    .into_iter()
    .map(|(id, owner, code, amount)| {
        let mut value = exported_item(id, code, amount);
        value["PARENT_ID"] = json!(owner);
        value
    })
    .collect();
    let report = h
        .service
        .sync_line_items(Hierarchy::Inpatient, &payloads(items), &actor())
        .await;
    assert!(report.is_complete_success());

    let evaluation = h
        .service
        .evaluate_working_state(Hierarchy::Inpatient, 500)
        .await
        .unwrap();
    assert_eq!(evaluation.reason, TransitionReason::AllExported);
    assert_eq!(evaluation.new_state, Some(EXPORTED));

    let summary = h
        .service
        .summarize(Hierarchy::Inpatient, 500, Some("typeCode"))
        .await
        .unwrap();
    assert_eq!(summary.groups.len(), 2);
    assert_eq!(summary.groups[1].type_code.as_deref(), Some("PARA"));
    assert_eq!(summary.groups[1].total_amount, 5.0);
    assert!(summary.groups[1].is_logically_exported);
    assert_eq!(summary.groups[1].logged_actor.as_deref(), Some("nurse1"));
}

#[tokio::test]
async fn test_child_synced_before_parent_is_backfilled() {
    let h = harness(Options::default());

    let child = h
        .service
        .sync_child(&payload(json!({"ID": 601})), 600, None, &actor())
        .await
        .unwrap();
    assert_eq!(child.parent_external_id, Some(600));
    assert_eq!(child.parent_local_id, None);

    let outcome = h
        .service
        .reconcile(Hierarchy::Inpatient, &payload(json!({"ID": 600})), &[], &actor())
        .await
        .unwrap();

    let rows = h.backend.rows(EntityKind::InpatientChild).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].parent_local_id, Some(outcome.sync.parent.local_id));

    // Once the parent exists, a standalone child picks up its local id directly
    let sibling = h
        .service
        .sync_child(&payload(json!({"ID": 602})), 600, None, &actor())
        .await
        .unwrap();
    assert_eq!(sibling.parent_local_id, Some(outcome.sync.parent.local_id));
}

#[tokio::test]
async fn test_catalog_outage_does_not_block_transition() {
    let h = harness(Options {
        catalog_failing: true,
        ..Options::default()
    });

    h.service
        .reconcile(
            Hierarchy::Cabinet,
            &payload(json!({"ID": 14})),
            &payloads(vec![exported_item(141, "A", 1)]),
            &actor(),
        )
        .await
        .unwrap();

    let evaluation = h
        .service
        .evaluate_working_state(Hierarchy::Cabinet, 14)
        .await
        .unwrap();
    assert!(evaluation.updated);
    assert_eq!(evaluation.new_state, Some(EXPORTED));
    assert!(evaluation.summary.unwrap().working_state.is_none());
    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 1);

    // summarize surfaces the same failure
    let err = h
        .service
        .summarize(Hierarchy::Cabinet, 14, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "upstream_unavailable");
}

#[tokio::test]
async fn test_summarize_missing_parent_is_not_found() {
    let h = harness(Options::default());
    let err = h
        .service
        .summarize(Hierarchy::Other, 77, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MedSyncError::NotFound(_)));
}

#[tokio::test]
async fn test_evaluate_after_sync() {
    let h = harness(Options {
        evaluate_after_sync: true,
        ..Options::default()
    });

    let outcome = h
        .service
        .reconcile(
            Hierarchy::Cabinet,
            &payload(json!({"ID": 15})),
            &payloads(vec![exported_item(151, "A", 1)]),
            &actor(),
        )
        .await
        .unwrap();

    let evaluation = outcome.evaluation.unwrap();
    assert!(evaluation.updated);
    assert_eq!(evaluation.reason, TransitionReason::AllExported);

    let json = serde_json::to_value(&outcome.sync.children).unwrap();
    assert_eq!(json["kind"], json!("line_items"));
}
