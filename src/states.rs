use crate::actions::EditorSignal;
use crate::lookup::ItemCache;
use crate::menu::{MenuArbiter, PickerKind, PickerSpec, PickerTarget};
use crate::model::ItemId;
use eframe::egui;

/// A change emitted by the modifiable state row.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StateChange {
    Replace(ItemId),
    Remove,
}

/// A state row inside a select-event editor: description and connection
/// handle only, no editing.
pub fn show_unmodifiable_state(
    ui: &mut egui::Ui,
    state_id: ItemId,
    cache: &ItemCache,
    signals: &mut Vec<EditorSignal>,
) {
    ui.label(cache.description(state_id));
    if ui.small_button("O").clicked() && !state_id.is_none() {
        signals.push(EditorSignal::GrabFocus(state_id));
    }
}

/// A state list row: description with a picker to change the reference,
/// a delete affordance and a connection handle.
pub fn show_state(
    ui: &mut egui::Ui,
    index: usize,
    state_id: ItemId,
    cache: &mut ItemCache,
    arbiter: &mut MenuArbiter,
    signals: &mut Vec<EditorSignal>,
) -> Option<StateChange> {
    cache.ensure_item(state_id);
    let mut change = None;

    ui.horizontal(|ui| {
        if ui.small_button("X").clicked() {
            change = Some(StateChange::Remove);
        }
        let target = PickerTarget::StateReference { index };
        if ui
            .selectable_label(arbiter.target_open(target), cache.description(state_id))
            .clicked()
        {
            arbiter.toggle(PickerSpec::open(PickerKind::State, target));
        }
        if ui.small_button("O").clicked() && !state_id.is_none() {
            signals.push(EditorSignal::GrabFocus(state_id));
        }
    });

    change
}
