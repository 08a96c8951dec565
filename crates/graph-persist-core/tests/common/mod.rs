#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use graph_persist_core::{
    ordinal_scalar, CodecError, PersisterSettings, PropertyChanged, Record, RecordBuilder, Scalar,
    Tracked, Value,
};
use tempfile::TempDir;
use uuid::Uuid;

// ── Simple record ───────────────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrackingObject {
    pub name: String,
    pub age: i32,
}

impl Record for TrackingObject {
    fn describe(fields: &mut RecordBuilder<Self>) {
        fields
            .scalar("name", |o| &o.name, |o| &mut o.name)
            .scalar("age", |o| &o.age, |o| &mut o.age);
    }
}

pub fn tracking_object(name: &str, age: i32) -> Tracked<TrackingObject> {
    Tracked::new(TrackingObject {
        name: name.to_string(),
        age,
    })
}

// ── Complex record ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Priority {
    #[default]
    Low,
    Normal = 5,
    High = 10,
}

ordinal_scalar!(Priority { Low, Normal, High });

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Scalar for Point {
    fn to_value(&self) -> Value {
        Value::Struct(vec![
            ("x".to_string(), self.x.to_value()),
            ("y".to_string(), self.y.to_value()),
        ])
    }

    fn from_value(value: &Value) -> Result<Self, CodecError> {
        Ok(Point {
            x: value.member("x")?,
            y: value.member("y")?,
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Item {
    pub label: String,
    pub quantity: u32,
}

impl Record for Item {
    fn describe(fields: &mut RecordBuilder<Self>) {
        fields
            .scalar("label", |i| &i.label, |i| &mut i.label)
            .scalar("quantity", |i| &i.quantity, |i| &mut i.quantity);
    }
}

pub fn item(label: &str, quantity: u32) -> Tracked<Item> {
    Tracked::new(Item {
        label: label.to_string(),
        quantity,
    })
}

#[derive(Debug, Default)]
pub struct ComplexTrackingObject {
    pub id: Uuid,
    pub flag: bool,
    pub small: i8,
    pub count: u64,
    pub big: i128,
    pub ratio: f64,
    pub initial: char,
    pub created: DateTime<Utc>,
    pub elapsed: Duration,
    pub offset: TimeDelta,
    pub priority: Priority,
    pub origin: Point,
    pub nickname: Option<String>,
    pub tags: Vec<String>,
    pub child: Option<Tracked<TrackingObject>>,
    pub items: Vec<Tracked<Item>>,
    pub slots: [Option<Tracked<Item>>; 3],
    pub shelf: Box<[Option<Tracked<Item>>]>,
}

impl Record for ComplexTrackingObject {
    fn describe(fields: &mut RecordBuilder<Self>) {
        fields
            .scalar("id", |o| &o.id, |o| &mut o.id)
            .scalar("flag", |o| &o.flag, |o| &mut o.flag)
            .scalar("small", |o| &o.small, |o| &mut o.small)
            .scalar("count", |o| &o.count, |o| &mut o.count)
            .scalar("big", |o| &o.big, |o| &mut o.big)
            .scalar("ratio", |o| &o.ratio, |o| &mut o.ratio)
            .scalar("initial", |o| &o.initial, |o| &mut o.initial)
            .scalar("created", |o| &o.created, |o| &mut o.created)
            .scalar("elapsed", |o| &o.elapsed, |o| &mut o.elapsed)
            .scalar("offset", |o| &o.offset, |o| &mut o.offset)
            .scalar("priority", |o| &o.priority, |o| &mut o.priority)
            .scalar("origin", |o| &o.origin, |o| &mut o.origin)
            .scalar("nickname", |o| &o.nickname, |o| &mut o.nickname)
            .scalar_list("tags", |o| &o.tags, |o| &mut o.tags)
            .nested("child", |o| &o.child, |o| &mut o.child)
            .records("items", |o| &o.items, |o| &mut o.items)
            .records("slots", |o| &o.slots, |o| &mut o.slots)
            .records("shelf", |o| &o.shelf, |o| &mut o.shelf);
    }
}

pub fn complex_object() -> Tracked<ComplexTrackingObject> {
    let shared = item("shared", 7);
    Tracked::new(ComplexTrackingObject {
        id: Uuid::new_v4(),
        flag: true,
        small: -8,
        count: u64::MAX - 1,
        big: -170_141_183_460_469_231_731_687_303_715_884_105_727,
        ratio: 0.125,
        initial: 'λ',
        created: Utc.with_ymd_and_hms(2024, 2, 29, 13, 45, 10).unwrap()
            + TimeDelta::nanoseconds(123_456_789),
        elapsed: Duration::new(90, 500),
        offset: TimeDelta::milliseconds(-1_500),
        priority: Priority::High,
        origin: Point { x: 1.5, y: -2.25 },
        nickname: Some("complex".to_string()),
        tags: vec!["a".to_string(), "b".to_string()],
        child: Some(tracking_object("child", 3)),
        items: vec![item("first", 1), item("second", 2), shared.clone()],
        slots: [Some(item("slot-0", 10)), None, Some(shared)],
        shelf: vec![None, Some(item("shelf-1", 4))].into_boxed_slice(),
    })
}

// ── Cyclic record ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Node {
    pub value: i32,
    pub next: Option<Tracked<Node>>,
    pub links: Vec<Tracked<Node>>,
}

impl Record for Node {
    fn describe(fields: &mut RecordBuilder<Self>) {
        fields
            .scalar("value", |n| &n.value, |n| &mut n.value)
            .nested("next", |n| &n.next, |n| &mut n.next)
            .records("links", |n| &n.links, |n| &mut n.links);
    }
}

/// Two nodes pointing at each other, the first also linking to itself.
pub fn node_ring() -> Tracked<Node> {
    let a = Tracked::new(Node {
        value: 1,
        ..Node::default()
    });
    let b = Tracked::new(Node {
        value: 2,
        next: Some(a.clone()),
        links: Vec::new(),
    });
    {
        let mut first = a.write();
        first.next = Some(b);
        first.links.push(a.clone());
    }
    a
}

/// Breaks the ring so the nodes can be freed at the end of a test.
pub fn break_ring(root: &Tracked<Node>) {
    let next = root.write().next.take();
    root.write().links.clear();
    if let Some(next) = next {
        next.write().next = None;
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

pub fn settings(dir: &TempDir) -> PersisterSettings {
    PersisterSettings::new(dir.path().join("state.bin"))
}

/// Records every notification raised by `tracked`.
pub fn record_changes<T>(tracked: &Tracked<T>) -> Arc<Mutex<Vec<PropertyChanged>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    tracked.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    seen
}

/// Collects availability notifications in order.
pub fn availability_counter() -> (Arc<Mutex<Vec<bool>>>, impl Fn(bool) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |available| sink.lock().unwrap().push(available))
}

pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
