mod actions;
mod lookup;
mod menu;
mod model;
mod runarea;
mod states;

use actions::{ActionChange, ActionEditorState, EditorSignal};
use eframe::egui;
use log::{debug, info};
use lookup::{DemoSource, ItemCache};
use menu::{MenuArbiter, PickerKind, PickerTarget};
use model::{Action, EventDelay, ItemId};
use runarea::{RunArea, RunSignal};
use states::StateChange;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

fn main() -> eframe::Result<()> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Showdeck",
        options,
        Box::new(|_cc| Box::new(ShowdeckApp::default())),
    )
}

struct ShowdeckApp {
    cache: ItemCache,
    arbiter: MenuArbiter,
    // The in-memory show: node id to its attached actions
    show: BTreeMap<ItemId, Vec<Action>>,
    selected_node: Option<ItemId>,
    editor_states: Vec<ActionEditorState>,
    state_list: Vec<ItemId>,
    run: RunArea,
    status: String,
    // Id typed into an unrestricted picker
    picker_entry: u32,
    // Source node of an in-progress graph-edge connection
    pending_connection: Option<ItemId>,
}

impl Default for ShowdeckApp {
    fn default() -> Self {
        // Demo description service; real transport plugs in behind the
        // same ItemSource boundary
        let source = DemoSource::new()
            .with_item(101, "Curtain Up")
            .with_item(102, "Blackout")
            .with_item(103, "Intermission Warning")
            .with_item(104, "House Open")
            .with_item(201, "Opening Scene")
            .with_item(202, "Finale Scene")
            .with_item(311, "Preshow")
            .with_item(312, "Running")
            .with_item(313, "Intermission")
            .with_status(301, "Show Phase", &[311, 312, 313]);

        let mut show = BTreeMap::new();
        show.insert(
            id(101),
            vec![
                Action::NewScene { new_scene: id(201) },
                Action::CueEvent {
                    event: EventDelay::new(id(102), Some(Duration::from_secs(5))),
                },
            ],
        );
        show.insert(id(102), vec![Action::CancelEvent { event: id(103) }]);
        show.insert(
            id(103),
            vec![Action::ModifyStatus {
                status_id: id(301),
                new_state: id(311),
            }],
        );
        show.insert(id(104), vec![Action::select_event(id(301))]);

        let items: Vec<ItemId> = vec![
            id(101),
            id(102),
            id(103),
            id(104),
            id(201),
            id(202),
            id(301),
            id(311),
            id(312),
            id(313),
        ];
        info!("[SHOW] Loaded demo show with {} nodes", show.len());

        ShowdeckApp {
            cache: ItemCache::new(source),
            arbiter: MenuArbiter::new(),
            show,
            selected_node: None,
            editor_states: Vec::new(),
            state_list: vec![id(311), id(312)],
            run: RunArea::new(items),
            status: "Ready".into(),
            picker_entry: 0,
            pending_connection: None,
        }
    }
}

fn id(n: u32) -> ItemId {
    ItemId::new_unchecked(n)
}

// Which action row a picker target belongs to. State references are not
// action rows.
fn target_action_index(target: PickerTarget) -> Option<usize> {
    match target {
        PickerTarget::NewScene { action }
        | PickerTarget::CueEvent { action }
        | PickerTarget::CancelEvent { action }
        | PickerTarget::ModifyStatusStatus { action }
        | PickerTarget::ModifyStatusState { action }
        | PickerTarget::SelectEventStatus { action }
        | PickerTarget::SelectEventEntry { action, .. } => Some(action),
        PickerTarget::StateReference { .. } => None,
    }
}

fn picker_title(kind: PickerKind) -> &'static str {
    match kind {
        PickerKind::Scene => "Select Scene",
        PickerKind::Status => "Select Status",
        PickerKind::State => "Select State",
        PickerKind::Event => "Select Event",
    }
}

impl ShowdeckApp {
    /// Route a picked id to the field its picker was opened for.
    fn apply_picked(&mut self, target: PickerTarget, picked: ItemId) {
        if let PickerTarget::StateReference { index } = target {
            if let Some(slot) = self.state_list.get_mut(index) {
                *slot = picked;
            }
            return;
        }

        let Some(node) = self.selected_node else {
            return;
        };
        let Some(index) = target_action_index(target) else {
            return;
        };
        let Some(actions) = self.show.get_mut(&node) else {
            return;
        };
        let (Some(action), Some(editor)) = (actions.get(index), self.editor_states.get(index))
        else {
            return;
        };

        // Select-event merges need the allowed set to prune stale entries
        let allowed: Vec<ItemId> = match action {
            Action::SelectEvent { status_id, .. } => self
                .cache
                .allowed_states(*status_id)
                .iter()
                .map(|pair| ItemId::new_unchecked(pair.id))
                .collect(),
            _ => Vec::new(),
        };

        match actions::apply_selection(action, editor, target, picked, &allowed) {
            Some(new_action) => {
                debug!("[EDIT] Node {} action {} updated", node, index);
                actions[index] = new_action;
            }
            // The action changed shape under the open picker
            None => debug!("[EDIT] Stale picker selection dropped"),
        }
    }

    fn handle_signals(&mut self, signals: Vec<EditorSignal>) {
        for signal in signals {
            match signal {
                EditorSignal::GrabFocus(item) => {
                    self.run.grab_focus(item);
                }
                EditorSignal::BeginConnection(item) => {
                    self.pending_connection = Some(item);
                    self.run.grab_focus(item);
                    self.status = format!("Connecting from {}", item);
                }
            }
        }
    }
}

impl eframe::App for ShowdeckApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        // Apply whatever the lookup worker answered since last frame
        self.cache.poll();

        // Header and status
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Showdeck");
                ui.separator();
                ui.label(&self.status);
                if let Some(item) = self.pending_connection {
                    ui.separator();
                    ui.label(format!("Connector pending from {}", item));
                }
            });
        });

        // Editor panel for the selected node
        let mut changes: Vec<(usize, ActionChange)> = Vec::new();
        let mut signals: Vec<EditorSignal> = Vec::new();
        let mut state_changes: Vec<(usize, StateChange)> = Vec::new();

        egui::SidePanel::left("editor")
            .min_width(360.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    match self.selected_node {
                        Some(node) => {
                            self.cache.ensure_item(node);
                            ui.heading(self.cache.description(node));

                            let actions = self.show.entry(node).or_default();
                            ui.menu_button("Add Action", |ui| {
                                let template = add_action_menu(ui);
                                if let Some(action) = template {
                                    actions.push(action);
                                    ui.close_menu();
                                }
                            });
                            self.editor_states
                                .resize_with(actions.len(), ActionEditorState::new);

                            for (index, action) in actions.iter().enumerate() {
                                let out = actions::show_action(
                                    ui,
                                    index,
                                    action,
                                    &mut self.editor_states[index],
                                    &mut self.cache,
                                    &mut self.arbiter,
                                    now,
                                );
                                if let Some(change) = out.change {
                                    changes.push((index, change));
                                }
                                signals.extend(out.signals);
                            }
                        }
                        None => {
                            ui.label("Click an item box to edit its actions");
                        }
                    }

                    ui.separator();
                    ui.heading("States");
                    for (index, state_id) in self.state_list.iter().enumerate() {
                        if let Some(change) = states::show_state(
                            ui,
                            index,
                            *state_id,
                            &mut self.cache,
                            &mut self.arbiter,
                            &mut signals,
                        ) {
                            state_changes.push((index, change));
                        }
                    }
                });
            });

        // Run area canvas
        let run_signal = egui::CentralPanel::default()
            .show(ctx, |ui| self.run.show(ui, &mut self.cache))
            .inner;

        // The picker holding the arbiter slot, rendered at one central
        // place; it only ever emits a selected id
        let current_picker = self.arbiter.current().map(|(_, spec)| spec.clone());
        let mut picked: Option<(PickerTarget, ItemId)> = None;
        let mut cancelled = false;
        if let Some(spec) = current_picker {
            if let Some(candidates) = &spec.candidates {
                for candidate in candidates {
                    self.cache.ensure_item(*candidate);
                }
            }
            egui::Window::new(picker_title(spec.kind))
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    match &spec.candidates {
                        Some(candidates) => {
                            for candidate in candidates {
                                let label =
                                    format!("{} ({})", self.cache.description(*candidate), candidate);
                                if ui.button(label).clicked() {
                                    picked = Some((spec.target, *candidate));
                                }
                            }
                        }
                        None => {
                            ui.horizontal(|ui| {
                                ui.label("Item id:");
                                ui.add(egui::DragValue::new(&mut self.picker_entry).speed(1));
                            });
                            if ui.button("Select").clicked() {
                                picked =
                                    Some((spec.target, ItemId::new_unchecked(self.picker_entry)));
                            }
                        }
                    }
                    ui.separator();
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                });
        }

        // Apply everything emitted this frame, model first

        // Reverse order so removals do not shift pending indices
        if let Some(node) = self.selected_node {
            if let Some(actions) = self.show.get_mut(&node) {
                for (index, change) in changes.into_iter().rev() {
                    match change {
                        ActionChange::Replace(new_action) => {
                            if index < actions.len() {
                                actions[index] = new_action;
                            }
                        }
                        ActionChange::Remove => {
                            if index < actions.len() {
                                actions.remove(index);
                                self.editor_states.remove(index);
                                // Row indices shifted under any open picker
                                self.arbiter.clear();
                                self.status = "Action removed".into();
                            }
                        }
                    }
                }
            }
        }

        for (index, change) in state_changes.into_iter().rev() {
            match change {
                StateChange::Replace(new_state) => {
                    if index < self.state_list.len() {
                        self.state_list[index] = new_state;
                    }
                }
                StateChange::Remove => {
                    if index < self.state_list.len() {
                        self.state_list.remove(index);
                        self.arbiter.clear();
                    }
                }
            }
        }

        if cancelled {
            self.arbiter.clear();
        }
        if let Some((target, item)) = picked {
            self.apply_picked(target, item);
            self.arbiter.clear();
        }

        match run_signal {
            Some(RunSignal::SelectItem(item)) => {
                if self.selected_node != Some(item) {
                    self.selected_node = Some(item);
                    self.editor_states.clear();
                    self.arbiter.clear();
                    self.status = format!("Editing {}", item);
                }
                if self.pending_connection.take().is_some() {
                    self.status = format!("Connected to {}", item);
                }
            }
            Some(RunSignal::Background) => {
                self.arbiter.clear();
            }
            None => {}
        }

        self.handle_signals(signals);

        // Wake up for the earliest pending debounce commit, or just often
        // enough to drain lookup replies that arrive while idle
        let next_commit = self
            .editor_states
            .iter()
            .filter_map(|state| state.commit.deadline())
            .min();
        match next_commit {
            Some(deadline) => {
                ctx.request_repaint_after(deadline.saturating_duration_since(Instant::now()))
            }
            None => ctx.request_repaint_after(Duration::from_millis(250)),
        }
    }
}

// The add-action menu, one entry per variant.
fn add_action_menu(ui: &mut egui::Ui) -> Option<Action> {
    if ui.button("New Scene").clicked() {
        return Some(Action::NewScene {
            new_scene: ItemId::none(),
        });
    }
    if ui.button("Modify Status").clicked() {
        return Some(Action::ModifyStatus {
            status_id: ItemId::none(),
            new_state: ItemId::none(),
        });
    }
    if ui.button("Cue Event").clicked() {
        return Some(Action::CueEvent {
            event: EventDelay::new(ItemId::none(), None),
        });
    }
    if ui.button("Cancel Event").clicked() {
        return Some(Action::CancelEvent {
            event: ItemId::none(),
        });
    }
    if ui.button("Select Event").clicked() {
        return Some(Action::select_event(ItemId::none()));
    }
    if ui.button("Save Data").clicked() {
        return Some(Action::SaveData {});
    }
    if ui.button("Send Data").clicked() {
        return Some(Action::SendData {});
    }
    None
}
