//! Persistence orchestrator: one tracked root, its undo/redo history,
//! save/load, auto-commit and auto-save.

mod autosave;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use graph_persist_config::{ConfigError, PersisterSettings};
use graph_persist_mod_history::{HistoryConfig, HistoryError, HistoryEvent, HistoryManager};
use uuid::Uuid;

use crate::codec::{BincodeCodec, Codec};
use crate::error::PersistError;
use crate::event::{EventHub, SubscriptionId};
use crate::graph;
use crate::merge;
use crate::schema::{Record, Schema, SchemaRegistry};
use crate::tracked::{ChangeNotifier, ChangeOrigin, PropertyChanged, Tracked};

use autosave::AutoSaveTask;

#[derive(Debug, Clone, Copy)]
enum Step {
    Undo,
    Redo,
}

struct State<T> {
    root: Option<Tracked<T>>,
    history: HistoryManager<Tracked<T>>,
    current_history_id: String,
    subscriptions: Vec<(Arc<ChangeNotifier>, SubscriptionId)>,
}

impl<T> State<T> {
    fn detach(&mut self) {
        for (notifier, id) in self.subscriptions.drain(..) {
            notifier.unsubscribe(id);
        }
    }
}

/// State shared with change handlers and the auto-save thread.
struct Shared<T, C> {
    schema: Arc<Schema>,
    codec: C,
    state: Mutex<State<T>>,
    active: AtomicBool,
    can_undo_changed: EventHub<bool>,
    can_redo_changed: EventHub<bool>,
}

impl<T: Record, C: Codec> Shared<T, C> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn dispatch(&self, events: Vec<HistoryEvent>) {
        for event in events {
            match event {
                HistoryEvent::UndoAvailabilityChanged(available) => {
                    self.can_undo_changed.emit(&available)
                }
                HistoryEvent::RedoAvailabilityChanged(available) => {
                    self.can_redo_changed.emit(&available)
                }
            }
        }
    }

    /// Deep copy of the current root, taken under the lock.
    fn snapshot(&self, state: &State<T>) -> Result<Tracked<T>, PersistError> {
        let root = state.root.as_ref().ok_or(PersistError::NotAttached)?;
        Ok(self.codec.deep_clone(&self.schema, root)?)
    }

    fn commit(&self, history_id: &str) -> Result<(), PersistError> {
        let events = {
            let mut state = self.lock();
            let snapshot = self.snapshot(&state)?;
            state.history.push(snapshot, history_id);
            state.history.take_events()
        };
        tracing::debug!("Committed history entry '{history_id}'");
        self.dispatch(events);
        Ok(())
    }

    /// Merges the next snapshot into the live graph, then moves the entry
    /// between the stacks. A failed merge leaves the history untouched and
    /// the live graph rolled back to its state before the call.
    fn step(&self, step: Step) -> Result<String, PersistError> {
        let (history_id, report, events) = {
            let mut state = self.lock();
            let next = match step {
                Step::Undo => state.history.peek_undo(),
                Step::Redo => state.history.peek_redo(),
            };
            let Some(snapshot) = next.map(|entry| entry.snapshot.clone()) else {
                return Err(match step {
                    Step::Undo => HistoryError::NothingToUndo,
                    Step::Redo => HistoryError::NothingToRedo,
                }
                .into());
            };
            let root = state.root.clone().ok_or(PersistError::NotAttached)?;
            let current = self.codec.deep_clone(&self.schema, &root)?;

            let report = match merge::merge(&root, &snapshot) {
                Ok(report) => report,
                Err(e) => {
                    roll_back(&root, &current);
                    return Err(e.into());
                }
            };

            let current_id = state.current_history_id.clone();
            let entry = match step {
                Step::Undo => state.history.undo(current, current_id)?,
                Step::Redo => state.history.redo(current, current_id)?,
            };
            let history_id = entry.history_id;
            state.current_history_id = history_id.clone();
            (history_id, report, state.history.take_events())
        };
        tracing::debug!(
            "{step:?} restored '{history_id}' ({} properties changed)",
            report.len()
        );
        self.dispatch(events);
        report.notify();
        Ok(history_id)
    }

    fn save_to(&self, path: &Path) -> Result<(), PersistError> {
        let snapshot = {
            let state = self.lock();
            self.snapshot(&state)?
        };
        let mut writer = BufWriter::new(File::create(path)?);
        self.codec.encode(&self.schema, &snapshot, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Tracks one object graph: undo/redo through snapshots, save/load through
/// a [`Codec`], optional auto-commit on every change and periodic auto-save.
///
/// All operations take `&self`; the persister can be shared across threads.
/// Change and availability handlers never run while its lock is held.
pub struct Persister<T: Record, C: Codec = BincodeCodec> {
    settings: PersisterSettings,
    shared: Arc<Shared<T, C>>,
    auto_save: Mutex<Option<AutoSaveTask>>,
}

impl<T: Record, C: Codec> std::fmt::Debug for Persister<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister")
            .field("type", &T::type_name())
            .field("file_path", &self.settings.file_path)
            .field("active", &self.shared.is_active())
            .finish()
    }
}

impl<T: Record> Persister<T> {
    /// Creates a persister with the default binary codec.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings or record
    /// descriptors, or an I/O error if the auto-save thread cannot start.
    pub fn new(settings: PersisterSettings) -> Result<Self, PersistError> {
        Self::with_codec(settings, BincodeCodec)
    }

    /// Reads a graph saved by `save` and attaches it to a new persister.
    ///
    /// # Errors
    ///
    /// Same as [`Persister::load_with_codec`].
    pub fn load(settings: PersisterSettings, path: impl AsRef<Path>) -> Result<Self, PersistError> {
        Self::load_with_codec(settings, path, BincodeCodec)
    }
}

impl<T: Record, C: Codec> Persister<T, C> {
    /// Creates a persister using `codec` for snapshots and files.
    ///
    /// # Errors
    ///
    /// See [`Persister::new`].
    pub fn with_codec(settings: PersisterSettings, codec: C) -> Result<Self, PersistError> {
        settings.validate()?;
        let schema = SchemaRegistry::schema_for::<T>()?;
        Self::build(settings, schema, codec, None)
    }

    /// Reads a graph from `path` and attaches it to a new persister.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings or an empty path,
    /// the I/O error if the file cannot be read, or a codec error if its
    /// content is not a graph of `T`.
    pub fn load_with_codec(
        settings: PersisterSettings,
        path: impl AsRef<Path>,
        codec: C,
    ) -> Result<Self, PersistError> {
        settings.validate()?;
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ConfigError::MissingLoadPath.into());
        }
        let schema = SchemaRegistry::schema_for::<T>()?;
        let mut reader = BufReader::new(File::open(path)?);
        let root = codec.decode::<T>(&schema, &mut reader)?;
        tracing::info!("Loaded {} from {}", T::type_name(), path.display());
        Self::build(settings, schema, codec, Some(root))
    }

    fn build(
        settings: PersisterSettings,
        schema: Arc<Schema>,
        codec: C,
        root: Option<Tracked<T>>,
    ) -> Result<Self, PersistError> {
        let persister = Self {
            shared: Arc::new(Shared {
                schema,
                codec,
                state: Mutex::new(State {
                    root: None,
                    history: HistoryManager::new(HistoryConfig::from(&settings)),
                    current_history_id: String::new(),
                    subscriptions: Vec::new(),
                }),
                active: AtomicBool::new(true),
                can_undo_changed: EventHub::new(),
                can_redo_changed: EventHub::new(),
            }),
            settings,
            auto_save: Mutex::new(None),
        };
        if let Some(root) = root {
            persister.attach(root)?;
        }
        persister.start_auto_save()?;
        Ok(persister)
    }

    fn start_auto_save(&self) -> Result<(), PersistError> {
        let Some(auto_save) = self.settings.active_auto_save() else {
            return Ok(());
        };
        let Some(path) = auto_save.file_path.clone() else {
            return Err(ConfigError::AutoSave("file path is missing").into());
        };
        let interval = auto_save.interval();
        let weak = Arc::downgrade(&self.shared);
        let task = AutoSaveTask::spawn(interval, move || auto_save_tick(&weak, &path))?;
        *self.lock_auto_save() = Some(task);
        tracing::debug!("Auto-save every {interval:?}");
        Ok(())
    }

    fn lock_auto_save(&self) -> MutexGuard<'_, Option<AutoSaveTask>> {
        self.auto_save.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_active(&self) -> Result<(), PersistError> {
        if self.shared.is_active() {
            Ok(())
        } else {
            Err(PersistError::Disposed)
        }
    }

    pub fn settings(&self) -> &PersisterSettings {
        &self.settings
    }

    pub fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    /// Makes `root` the tracked object.
    ///
    /// With `track_changes` set, every instance reachable from `root` at this
    /// moment gets the auto-commit handler. Subscriptions made by a previous
    /// attach are removed first; the history is kept.
    ///
    /// # Errors
    ///
    /// Returns `Disposed` after `dispose`, or a schema error if a reachable
    /// type has an invalid descriptor.
    pub fn attach(&self, root: Tracked<T>) -> Result<(), PersistError> {
        self.ensure_active()?;
        let notifiers = if self.settings.track_changes {
            graph::reachable_notifiers(&root)?
        } else {
            Vec::new()
        };

        let mut state = self.shared.lock();
        state.detach();
        for notifier in notifiers {
            let id = notifier.subscribe(auto_commit_handler(Arc::downgrade(&self.shared)));
            state.subscriptions.push((notifier, id));
        }
        tracing::debug!(
            "Attached {} ({} instances observed)",
            T::type_name(),
            state.subscriptions.len()
        );
        state.root = Some(root);
        Ok(())
    }

    pub fn tracked_object(&self) -> Option<Tracked<T>> {
        self.shared.lock().root.clone()
    }

    /// Pushes a snapshot of the current state under `history_id`.
    ///
    /// Clears the redo history.
    ///
    /// # Errors
    ///
    /// Returns `NotAttached` without a tracked object, `Disposed` after
    /// `dispose`, or the codec error if the snapshot cannot be taken.
    pub fn commit_current_state(&self, history_id: &str) -> Result<(), PersistError> {
        self.ensure_active()?;
        self.shared.commit(history_id)
    }

    /// Restores the most recent snapshot into the live graph and returns
    /// its history id. The state being left becomes redoable.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::NothingToUndo` when there is nothing to undo,
    /// or the merge error when the snapshot no longer fits the live graph;
    /// both stacks are then unchanged.
    pub fn undo(&self) -> Result<String, PersistError> {
        self.ensure_active()?;
        self.shared.step(Step::Undo)
    }

    /// Reverses the last `undo` and returns the restored history id, which
    /// is empty when the restored state was never committed.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::NothingToRedo` when there is nothing to redo,
    /// or the merge error as for [`Persister::undo`].
    pub fn redo(&self) -> Result<String, PersistError> {
        self.ensure_active()?;
        self.shared.step(Step::Redo)
    }

    pub fn can_undo(&self) -> bool {
        self.shared.lock().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.shared.lock().history.can_redo()
    }

    pub fn undo_len(&self) -> usize {
        self.shared.lock().history.undo_len()
    }

    pub fn redo_len(&self) -> usize {
        self.shared.lock().history.redo_len()
    }

    /// Id of the snapshot last restored by undo or redo; empty before any.
    pub fn current_history_id(&self) -> String {
        self.shared.lock().current_history_id.clone()
    }

    /// Called with the new value whenever undo availability flips.
    pub fn on_can_undo_changed(
        &self,
        handler: impl Fn(bool) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.shared
            .can_undo_changed
            .subscribe(move |available: &bool| handler(*available))
    }

    /// Called with the new value whenever redo availability flips.
    pub fn on_can_redo_changed(
        &self,
        handler: impl Fn(bool) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.shared
            .can_redo_changed
            .subscribe(move |available: &bool| handler(*available))
    }

    /// Removes an availability handler. Returns `false` if it was not found.
    pub fn remove_handler(&self, id: SubscriptionId) -> bool {
        self.shared.can_undo_changed.unsubscribe(id) || self.shared.can_redo_changed.unsubscribe(id)
    }

    /// Writes the tracked object to `settings.file_path`.
    ///
    /// # Errors
    ///
    /// See [`Persister::save_to`].
    pub fn save(&self) -> Result<(), PersistError> {
        self.save_to(&self.settings.file_path)
    }

    /// Writes the tracked object to `path`, replacing the file.
    ///
    /// # Errors
    ///
    /// Returns `NotAttached` without a tracked object, the I/O error if the
    /// file cannot be written, or the codec error.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        self.shared.save_to(path)?;
        tracing::info!("Saved {} to {}", T::type_name(), path.display());
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        !self.shared.is_active()
    }

    /// Stops auto-commit and auto-save. Safe to call more than once.
    ///
    /// Change handlers are removed before the auto-save thread is joined, so
    /// no commit starts once this returns.
    pub fn dispose(&self) {
        if !self.shared.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shared.lock().detach();
        let task = self.lock_auto_save().take();
        if let Some(task) = task {
            task.stop();
        }
        tracing::debug!("Disposed persister for {}", T::type_name());
    }
}

impl<T: Record, C: Codec> Drop for Persister<T, C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Puts back the values a failed merge already wrote into `root`.
///
/// `before` is a copy of `root` taken before the merge, so it has the same
/// shape and merging it back cannot hit a capacity limit. The partial
/// changes were never announced, so the report is dropped.
fn roll_back<T: Record>(root: &Tracked<T>, before: &Tracked<T>) {
    if let Err(e) = merge::merge(root, before) {
        tracing::warn!("Rolling back a failed merge into {} failed: {e}", T::type_name());
    }
}

fn auto_commit_handler<T: Record, C: Codec>(
    shared: Weak<Shared<T, C>>,
) -> impl Fn(&PropertyChanged) + Send + Sync + 'static {
    move |event| {
        if event.origin != ChangeOrigin::User {
            return;
        }
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.is_active() {
            return;
        }
        let history_id = Uuid::new_v4().to_string();
        if let Err(e) = shared.commit(&history_id) {
            tracing::warn!("Auto-commit after '{}' changed failed: {e}", event.property);
        }
    }
}

fn auto_save_tick<T: Record, C: Codec>(shared: &Weak<Shared<T, C>>, path: &Path) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    if !shared.is_active() {
        return;
    }
    match shared.save_to(path) {
        Ok(()) => tracing::debug!("Auto-saved to {}", path.display()),
        Err(PersistError::NotAttached) => {}
        Err(e) => tracing::warn!("Auto-save to {} failed: {e}", path.display()),
    }
}
