use crate::lookup::ItemCache;
use crate::menu::{MenuArbiter, PickerKind, PickerSpec, PickerTarget};
use crate::model::{self, Action, EventDelay, ItemId};
use crate::states;
use eframe::egui;
use std::time::{Duration, Instant};

/// Trailing-edge timer for auto-committing in-progress edits. Scheduling
/// replaces any earlier deadline, so at most one commit is ever pending
/// per editor.
pub struct Debounce {
    deadline: Option<Instant>,
}

impl Debounce {
    /// Quiet period after the last edit before the commit fires.
    pub const DELAY: Duration = Duration::from_millis(100);

    pub fn new() -> Debounce {
        Debounce { deadline: None }
    }

    /// Schedule (or reschedule) the commit for `now + DELAY`.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + Self::DELAY);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending commit is due, for repaint scheduling.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True exactly once, when the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Per-row editor state that outlives a frame: the collapse toggle, the
/// cue editor's local delay draft and its pending commit.
pub struct ActionEditorState {
    pub open: bool,
    pub delay_draft: f64,
    pub commit: Debounce,
    // Committed cue values last synced into the draft
    last_seen: Option<(ItemId, Option<Duration>)>,
}

impl ActionEditorState {
    pub fn new() -> ActionEditorState {
        ActionEditorState {
            open: false, // collapsed by default
            delay_draft: 0.0,
            commit: Debounce::new(),
            last_seen: None,
        }
    }

    /// Resynchronize the delay draft from the committed model, but only
    /// when the committed id or delay actually changed (e.g. an undo).
    /// Otherwise in-progress typing would be fought every frame.
    fn sync_cue(&mut self, event: &EventDelay) {
        let committed = (event.event_id, event.delay);
        if self.last_seen != Some(committed) {
            self.delay_draft = model::delay_as_secs(event.delay);
            self.last_seen = Some(committed);
        }
    }
}

/// A change emitted by an editor, applied by the owning container.
#[derive(Clone, PartialEq, Debug)]
pub enum ActionChange {
    Replace(Action),
    Remove,
}

/// Upward signals that are not model changes.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EditorSignal {
    /// Navigate the canvas to this item.
    GrabFocus(ItemId),
    /// Begin a graph-edge connection from this action's node.
    BeginConnection(ItemId),
}

/// Everything one editor row produced this frame.
pub struct ActionEditorOutput {
    pub change: Option<ActionChange>,
    pub signals: Vec<EditorSignal>,
}

impl ActionEditorOutput {
    fn none() -> ActionEditorOutput {
        ActionEditorOutput {
            change: None,
            signals: Vec::new(),
        }
    }
}

/// Render one action row, dispatching on the variant. The match is
/// exhaustive: there is no silent fallthrough for an unknown action.
pub fn show_action(
    ui: &mut egui::Ui,
    index: usize,
    action: &Action,
    state: &mut ActionEditorState,
    cache: &mut ItemCache,
    arbiter: &mut MenuArbiter,
    now: Instant,
) -> ActionEditorOutput {
    let mut out = ActionEditorOutput::none();

    match action {
        Action::NewScene { new_scene } => {
            cache.ensure_item(*new_scene);
            fragment(ui, action.title(), *new_scene, &mut state.open, &mut out, |ui, _out| {
                let target = PickerTarget::NewScene { action: index };
                detail_line(ui, cache.description(*new_scene), arbiter.target_open(target), || {
                    arbiter.toggle(PickerSpec::open(PickerKind::Scene, target))
                });
            });
        }

        Action::ModifyStatus {
            status_id,
            new_state,
        } => {
            cache.ensure_status(*status_id, Some(*new_state));
            let allowed: Vec<ItemId> = cache
                .allowed_states(*status_id)
                .iter()
                .map(|pair| ItemId::new_unchecked(pair.id))
                .collect();
            fragment(ui, action.title(), *status_id, &mut state.open, &mut out, |ui, out| {
                let status_target = PickerTarget::ModifyStatusStatus { action: index };
                detail_line(
                    ui,
                    cache.description(*status_id),
                    arbiter.target_open(status_target),
                    || arbiter.toggle(PickerSpec::open(PickerKind::Status, status_target)),
                );

                // The state picker is restricted to the status's own states.
                // Both pickers share the one arbiter slot, so opening one
                // closes the other without the two knowing about each other.
                ui.horizontal(|ui| {
                    ui.label("New State:");
                    let state_target = PickerTarget::ModifyStatusState { action: index };
                    let editing = arbiter.target_open(state_target);
                    if ui
                        .selectable_label(editing, cache.description(*new_state))
                        .clicked()
                    {
                        arbiter.toggle(PickerSpec::restricted(
                            PickerKind::State,
                            state_target,
                            allowed.clone(),
                        ));
                    }
                    if connection_node(ui).clicked() {
                        out.signals.push(EditorSignal::GrabFocus(*new_state));
                    }
                });
            });
        }

        Action::CueEvent { event } => {
            cache.ensure_item(event.event_id);
            state.sync_cue(event);

            // Fire a due commit even while the row is collapsed
            if state.commit.fire(now) {
                out.change = Some(ActionChange::Replace(commit_cue(
                    event.event_id,
                    state.delay_draft,
                )));
            }

            // Split borrows: the fragment owns the collapse flag while the
            // content edits the draft and the pending commit
            let draft = &mut state.delay_draft;
            let commit = &mut state.commit;
            fragment(ui, action.title(), event.event_id, &mut state.open, &mut out, |ui, _out| {
                let target = PickerTarget::CueEvent { action: index };
                detail_line(
                    ui,
                    cache.description(event.event_id),
                    arbiter.target_open(target),
                    || arbiter.toggle(PickerSpec::open(PickerKind::Event, target)),
                );
                ui.horizontal(|ui| {
                    ui.label("Delay");
                    let response = ui.add(
                        egui::DragValue::new(draft)
                            .speed(0.1)
                            .clamp_range(0.0..=86_400.0),
                    );
                    ui.label("Seconds");
                    if response.changed() {
                        // Trailing edge: every keystroke replaces the
                        // pending commit rather than queueing another
                        commit.schedule(now);
                    }
                });
            });
        }

        Action::CancelEvent { event } => {
            cache.ensure_item(*event);
            fragment(ui, action.title(), *event, &mut state.open, &mut out, |ui, _out| {
                let target = PickerTarget::CancelEvent { action: index };
                detail_line(ui, cache.description(*event), arbiter.target_open(target), || {
                    arbiter.toggle(PickerSpec::open(PickerKind::Event, target))
                });
            });
        }

        Action::SelectEvent {
            status_id,
            event_map,
        } => {
            cache.ensure_status(*status_id, None);
            // Row order follows the allowed-states list, never the map
            let allowed = cache.allowed_states(*status_id).to_vec();
            for pair in &allowed {
                cache.ensure_item(ItemId::new_unchecked(pair.id));
            }
            for event in event_map.values() {
                cache.ensure_item(*event);
            }

            fragment(ui, action.title(), *status_id, &mut state.open, &mut out, |ui, out| {
                let status_target = PickerTarget::SelectEventStatus { action: index };
                detail_line(
                    ui,
                    cache.description(*status_id),
                    arbiter.target_open(status_target),
                    || arbiter.toggle(PickerSpec::open(PickerKind::Status, status_target)),
                );

                for pair in &allowed {
                    let state_id = ItemId::new_unchecked(pair.id);
                    // An unassigned state shows the empty placeholder
                    let event = event_map
                        .get(&pair.id)
                        .copied()
                        .unwrap_or_else(ItemId::none);
                    ui.horizontal(|ui| {
                        states::show_unmodifiable_state(ui, state_id, cache, &mut out.signals);
                        let entry_target = PickerTarget::SelectEventEntry {
                            action: index,
                            state: state_id,
                        };
                        let editing = arbiter.target_open(entry_target);
                        if ui
                            .selectable_label(editing, cache.description(event))
                            .clicked()
                        {
                            arbiter.toggle(PickerSpec::open(PickerKind::Event, entry_target));
                        }
                    });
                }
            });
        }

        // Stubs: nothing to edit yet
        Action::SaveData {} | Action::SendData {} => {
            fragment(ui, action.title(), action.primary_id(), &mut state.open, &mut out, |ui, _out| {
                ui.label("Not Yet Available");
            });
        }
    }

    out
}

/// Route a picked id into a rebuilt action. Returns None when the target
/// no longer matches the action (a stale picker selection).
pub fn apply_selection(
    action: &Action,
    state: &ActionEditorState,
    target: PickerTarget,
    picked: ItemId,
    allowed: &[ItemId],
) -> Option<Action> {
    match (target, action) {
        (PickerTarget::NewScene { .. }, Action::NewScene { .. }) => {
            Some(Action::NewScene { new_scene: picked })
        }
        (PickerTarget::ModifyStatusStatus { .. }, Action::ModifyStatus { new_state, .. }) => {
            Some(Action::ModifyStatus {
                status_id: picked,
                new_state: *new_state,
            })
        }
        (PickerTarget::ModifyStatusState { .. }, Action::ModifyStatus { status_id, .. }) => {
            Some(Action::ModifyStatus {
                status_id: *status_id,
                new_state: picked,
            })
        }
        // A picked event commits together with the current delay draft
        (PickerTarget::CueEvent { .. }, Action::CueEvent { .. }) => {
            Some(commit_cue(picked, state.delay_draft))
        }
        (PickerTarget::CancelEvent { .. }, Action::CancelEvent { .. }) => {
            Some(Action::CancelEvent { event: picked })
        }
        // Choosing a new status invalidates every prior assignment
        (PickerTarget::SelectEventStatus { .. }, Action::SelectEvent { .. }) => {
            Some(Action::select_event(picked))
        }
        (
            PickerTarget::SelectEventEntry { state, .. },
            Action::SelectEvent {
                status_id,
                event_map,
            },
        ) => Some(Action::SelectEvent {
            status_id: *status_id,
            event_map: model::with_selected_event(event_map, allowed, state, picked),
        }),
        _ => None,
    }
}

// Build the cue action from the committed id and the local draft. A zero
// draft emits no delay field at all.
fn commit_cue(event_id: ItemId, draft: f64) -> Action {
    Action::CueEvent {
        event: EventDelay::new(event_id, model::delay_from_secs(draft)),
    }
}

// The shared wrapper around every variant editor: delete affordance,
// collapse toggle and the connection handle.
fn fragment(
    ui: &mut egui::Ui,
    title: &str,
    focus: ItemId,
    open: &mut bool,
    out: &mut ActionEditorOutput,
    content: impl FnOnce(&mut egui::Ui, &mut ActionEditorOutput),
) {
    ui.group(|ui| {
        ui.horizontal(|ui| {
            if ui.small_button("X").clicked() {
                out.change = Some(ActionChange::Remove);
            }
            let marker = if *open { "v" } else { "<" };
            if ui
                .selectable_label(*open, format!("{} {}", title, marker))
                .clicked()
            {
                *open = !*open;
            }
            let node = connection_node(ui);
            if (node.drag_started() || node.clicked()) && !focus.is_none() {
                out.signals.push(EditorSignal::BeginConnection(focus));
            }
        });
        if *open {
            content(ui, out);
        }
    });
}

// One-line detail area: description plus the "Click To Change" note, both
// toggling the picker.
fn detail_line(
    ui: &mut egui::Ui,
    description: &str,
    editing: bool,
    mut toggle: impl FnMut(),
) {
    ui.horizontal(|ui| {
        if ui.selectable_label(editing, description).clicked() {
            toggle();
        }
        if ui.small_button("Click To Change").clicked() {
            toggle();
        }
    });
}

// The drag-source handle for graph connections.
fn connection_node(ui: &mut egui::Ui) -> egui::Response {
    ui.small_button("O")
}
