mod common;

use std::fs::File;
use std::io::Write;

use common::*;
use graph_persist_core::graph::{capture, deep_clone, restore};
use graph_persist_core::{
    BincodeCodec, CodecError, ConfigError, PersistError, Persister, SchemaRegistry, Value,
};
use tempfile::TempDir;

fn assert_same_scalars(a: &ComplexTrackingObject, b: &ComplexTrackingObject) {
    assert_eq!(a.id, b.id);
    assert_eq!(a.flag, b.flag);
    assert_eq!(a.small, b.small);
    assert_eq!(a.count, b.count);
    assert_eq!(a.big, b.big);
    assert_eq!(a.ratio, b.ratio);
    assert_eq!(a.initial, b.initial);
    assert_eq!(a.created, b.created);
    assert_eq!(a.elapsed, b.elapsed);
    assert_eq!(a.offset, b.offset);
    assert_eq!(a.priority, b.priority);
    assert_eq!(a.origin, b.origin);
    assert_eq!(a.nickname, b.nickname);
    assert_eq!(a.tags, b.tags);
}

// ── Save / load ─────────────────────────────────────────────────────

#[test]
fn test_round_trip_reproduces_complex_object() {
    let dir = TempDir::new().unwrap();
    let original = complex_object();
    let persister = Persister::<ComplexTrackingObject>::new(settings(&dir)).unwrap();
    persister.attach(original.clone()).unwrap();
    persister.save().unwrap();

    let loaded =
        Persister::<ComplexTrackingObject>::load(settings(&dir), dir.path().join("state.bin"))
            .unwrap();
    let root = loaded.tracked_object().unwrap();
    assert!(!root.ptr_eq(&original));

    let (a, b) = (original.read(), root.read());
    assert_same_scalars(&a, &b);
    assert_eq!(
        *b.child.as_ref().unwrap().read(),
        *a.child.as_ref().unwrap().read()
    );

    let items: Vec<_> = b.items.iter().map(|i| i.read().clone()).collect();
    let expected: Vec<_> = a.items.iter().map(|i| i.read().clone()).collect();
    assert_eq!(items, expected);

    assert_eq!(b.slots[0].as_ref().unwrap().read().label, "slot-0");
    assert!(b.slots[1].is_none());
    assert_eq!(b.shelf.len(), 2);
    assert!(b.shelf[0].is_none());
    assert_eq!(b.shelf[1].as_ref().unwrap().read().label, "shelf-1");
}

#[test]
fn test_shared_instances_stay_shared_after_load() {
    let dir = TempDir::new().unwrap();
    let persister = Persister::<ComplexTrackingObject>::new(settings(&dir)).unwrap();
    persister.attach(complex_object()).unwrap();
    persister.save().unwrap();

    let loaded =
        Persister::<ComplexTrackingObject>::load(settings(&dir), dir.path().join("state.bin"))
            .unwrap();
    let root = loaded.tracked_object().unwrap();
    let root = root.read();
    assert!(root.items[2].ptr_eq(root.slots[2].as_ref().unwrap()));
    assert!(!root.items[0].ptr_eq(&root.items[1]));
}

#[test]
fn test_save_to_writes_elsewhere() {
    let dir = TempDir::new().unwrap();
    let persister = Persister::<TrackingObject>::new(settings(&dir)).unwrap();
    persister.attach(tracking_object("elsewhere", 4)).unwrap();

    let other = dir.path().join("other.bin");
    persister.save_to(&other).unwrap();
    assert!(other.exists());
    assert!(!dir.path().join("state.bin").exists());

    let loaded = Persister::<TrackingObject>::load(settings(&dir), &other).unwrap();
    assert_eq!(loaded.tracked_object().unwrap().read().name, "elsewhere");
}

#[test]
fn test_loaded_persister_tracks_changes() {
    let dir = TempDir::new().unwrap();
    {
        let persister = Persister::<TrackingObject>::new(settings(&dir)).unwrap();
        persister.attach(tracking_object("x", 1)).unwrap();
        persister.save().unwrap();
    }

    let loaded = Persister::<TrackingObject>::load(
        settings(&dir).with_track_changes(true),
        dir.path().join("state.bin"),
    )
    .unwrap();
    let root = loaded.tracked_object().unwrap();
    root.set("age", |o| &mut o.age, 2);
    assert_eq!(loaded.undo_len(), 1);
}

#[test]
fn test_cyclic_graph_round_trip() {
    let dir = TempDir::new().unwrap();
    let ring = node_ring();
    let persister = Persister::<Node>::new(settings(&dir)).unwrap();
    persister.attach(ring.clone()).unwrap();
    persister.save().unwrap();

    let loaded = Persister::<Node>::load(settings(&dir), dir.path().join("state.bin")).unwrap();
    let root = loaded.tracked_object().unwrap();
    let next = root.read().next.clone().unwrap();
    assert_eq!(root.read().value, 1);
    assert_eq!(next.read().value, 2);
    assert!(next.read().next.as_ref().unwrap().ptr_eq(&root));
    assert!(root.read().links[0].ptr_eq(&root));

    loaded.dispose();
    break_ring(&root);
    persister.dispose();
    break_ring(&ring);
}

mod before_move {
    use super::*;
    use graph_persist_core::{Record, RecordBuilder, Tracked};

    #[derive(Debug, Default)]
    pub struct Profile {
        pub name: String,
        pub favorite: Option<Tracked<Item>>,
    }

    impl Record for Profile {
        fn describe(fields: &mut RecordBuilder<Self>) {
            fields
                .scalar("name", |p| &p.name, |p| &mut p.name)
                .nested("favorite", |p| &p.favorite, |p| &mut p.favorite);
        }
    }
}

mod after_move {
    use super::*;
    use graph_persist_core::{Record, RecordBuilder, Tracked};

    #[derive(Debug, Default)]
    pub struct Profile {
        pub name: String,
        pub favorite: Option<Tracked<Item>>,
    }

    impl Record for Profile {
        fn describe(fields: &mut RecordBuilder<Self>) {
            fields
                .scalar("name", |p| &p.name, |p| &mut p.name)
                .nested("favorite", |p| &p.favorite, |p| &mut p.favorite);
        }
    }
}

#[test]
fn test_file_loads_after_record_type_moves_module() {
    let dir = TempDir::new().unwrap();
    let persister = Persister::<before_move::Profile>::new(settings(&dir)).unwrap();
    persister
        .attach(graph_persist_core::Tracked::new(before_move::Profile {
            name: "ada".to_string(),
            favorite: Some(item("tea", 2)),
        }))
        .unwrap();
    persister.save().unwrap();

    let loaded =
        Persister::<after_move::Profile>::load(settings(&dir), dir.path().join("state.bin"))
            .unwrap();
    let root = loaded.tracked_object().unwrap();
    let root = root.read();
    assert_eq!(root.name, "ada");
    assert_eq!(
        *root.favorite.as_ref().unwrap().read(),
        Item {
            label: "tea".to_string(),
            quantity: 2
        }
    );
}

// ── Load errors ─────────────────────────────────────────────────────

#[test]
fn test_load_missing_file_passes_io_error_through() {
    let dir = TempDir::new().unwrap();
    let err = Persister::<TrackingObject>::load(settings(&dir), dir.path().join("missing.bin"))
        .unwrap_err();
    match err {
        PersistError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_load_with_empty_path_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let err = Persister::<TrackingObject>::load(settings(&dir), "").unwrap_err();
    assert!(err.is_config());
    assert!(matches!(
        err,
        PersistError::Config(ConfigError::MissingLoadPath)
    ));
}

#[test]
fn test_load_rejects_foreign_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.bin");
    File::create(&path)
        .unwrap()
        .write_all(b"definitely not a graph")
        .unwrap();

    let err = Persister::<TrackingObject>::load(settings(&dir), &path).unwrap_err();
    assert!(matches!(err, PersistError::Codec(CodecError::BadMagic)));
}

#[test]
fn test_load_rejects_other_root_type() {
    let dir = TempDir::new().unwrap();
    let persister = Persister::<TrackingObject>::new(settings(&dir)).unwrap();
    persister.attach(tracking_object("x", 1)).unwrap();
    persister.save().unwrap();

    let err = Persister::<Item>::load(settings(&dir), dir.path().join("state.bin")).unwrap_err();
    assert!(matches!(
        err,
        PersistError::Codec(CodecError::NodeTypeMismatch { node: 0, .. })
    ));
}

#[test]
fn test_invalid_settings_are_rejected() {
    let err = Persister::<TrackingObject>::new(Default::default()).unwrap_err();
    assert!(err.is_config());

    let dir = TempDir::new().unwrap();
    let err =
        Persister::<TrackingObject>::new(settings(&dir).with_max_history_steps(0)).unwrap_err();
    assert!(matches!(
        err,
        PersistError::Config(ConfigError::ZeroHistorySteps)
    ));
}

// ── Codec primitives ────────────────────────────────────────────────

#[test]
fn test_deep_clone_is_independent() {
    let schema = SchemaRegistry::schema_for::<ComplexTrackingObject>().unwrap();
    let original = complex_object();
    let copy = deep_clone(&schema, &original).unwrap();

    assert!(!copy.ptr_eq(&original));
    assert_same_scalars(&original.read(), &copy.read());
    let copy_child = copy.read().child.clone().unwrap();
    assert!(!copy_child.ptr_eq(original.read().child.as_ref().unwrap()));

    copy_child.write().age = 100;
    assert_eq!(original.read().child.as_ref().unwrap().read().age, 3);

    let copy = copy.read();
    assert!(copy.items[2].ptr_eq(copy.slots[2].as_ref().unwrap()));
}

#[test]
fn test_capture_writes_one_node_per_instance() {
    let schema = SchemaRegistry::schema_for::<ComplexTrackingObject>().unwrap();
    let image = capture(&schema, &complex_object()).unwrap();

    // root, child, three items (one shared with a slot), slot-0, shelf-1
    assert_eq!(image.nodes.len(), 7);
    let root = image.root_node().unwrap();
    assert_eq!(root.type_name, "ComplexTrackingObject");

    let indices: Vec<_> = root.fields.iter().map(|f| f.index).collect();
    let mut sorted = indices.clone();
    sorted.sort_unstable();
    assert_eq!(indices, sorted);

    let priority = root.fields.iter().find(|f| f.name == "priority").unwrap();
    assert_eq!(priority.value, Value::Enum(10));
}

#[test]
fn test_restore_reports_dangling_reference() {
    let schema = SchemaRegistry::schema_for::<ComplexTrackingObject>().unwrap();
    let mut image = capture(&schema, &complex_object()).unwrap();
    let child = image.nodes[0]
        .fields
        .iter_mut()
        .find(|f| f.name == "child")
        .unwrap();
    child.value = Value::Ref(999);

    let err = restore::<ComplexTrackingObject>(&schema, &image).unwrap_err();
    assert!(matches!(err, CodecError::DanglingReference(999)));
}

#[test]
fn test_codec_rejects_mismatched_schema() {
    let schema = SchemaRegistry::schema_for::<TrackingObject>().unwrap();
    let err = capture(&schema, &item("x", 1)).unwrap_err();
    assert!(matches!(err, CodecError::SchemaMismatch { .. }));
}

#[test]
fn test_read_image_without_record_types() {
    let dir = TempDir::new().unwrap();
    let persister = Persister::<TrackingObject>::new(settings(&dir)).unwrap();
    persister.attach(tracking_object("raw", 9)).unwrap();
    persister.save().unwrap();

    let mut file = File::open(dir.path().join("state.bin")).unwrap();
    let image = BincodeCodec::read_image(&mut file).unwrap();
    let root = image.root_node().unwrap();
    let names: Vec<_> = root.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["age", "name"]);
    assert_eq!(root.fields[0].value, Value::I64(9));
    assert_eq!(root.fields[1].value, Value::Str("raw".to_string()));
}
