use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Reserved id meaning "nothing selected". Never a valid reference.
pub const EMPTY_ID: u32 = 0;

/// Opaque identifier for anything the show references (events, scenes,
/// statuses, states). The field is private so the empty sentinel can only
/// be produced deliberately.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ItemId {
    id: u32,
}

impl ItemId {
    /// Create an item id, rejecting the reserved empty sentinel.
    pub fn new(id: u32) -> Option<ItemId> {
        if id == EMPTY_ID {
            return None;
        }
        Some(ItemId { id })
    }

    /// Create an item id without checking for the sentinel. Useful when the
    /// sentinel is a legal value (e.g. an unfilled event slot).
    pub fn new_unchecked(id: u32) -> ItemId {
        ItemId { id }
    }

    /// The empty sentinel.
    pub fn none() -> ItemId {
        ItemId { id: EMPTY_ID }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_none(&self) -> bool {
        self.id == EMPTY_ID
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// An event reference with an optional trigger delay. A zero delay is
/// normalized to no delay at construction so it never reaches the wire.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct EventDelay {
    pub event_id: ItemId,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub delay: Option<Duration>,
}

impl EventDelay {
    pub fn new(event_id: ItemId, delay: Option<Duration>) -> EventDelay {
        // Normalize a zero duration to "no delay"
        let delay = delay.filter(|d| !d.is_zero());
        EventDelay { event_id, delay }
    }
}

/// One action attached to a node in the show graph. Exactly one variant is
/// active at a time; the serde form is externally tagged to match the wire
/// (`{"NewScene": {"new_scene": {"id": 5}}}` and so on).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Action {
    /// Switch the show to a different scene.
    NewScene { new_scene: ItemId },
    /// Set a status to a new state.
    ModifyStatus { status_id: ItemId, new_state: ItemId },
    /// Cue an event, optionally after a delay.
    CueEvent { event: EventDelay },
    /// Cancel a queued event.
    CancelEvent { event: ItemId },
    /// Cue one of several events depending on the current state of a status.
    SelectEvent {
        status_id: ItemId,
        event_map: BTreeMap<u32, ItemId>,
    },
    /// Stub: persist collected data. Not yet editable.
    SaveData {},
    /// Stub: transmit collected data. Not yet editable.
    SendData {},
}

impl Action {
    /// Display title for the editor fragment.
    pub fn title(&self) -> &'static str {
        match self {
            Action::NewScene { .. } => "New Scene",
            Action::ModifyStatus { .. } => "Modify Status",
            Action::CueEvent { .. } => "Cue Event",
            Action::CancelEvent { .. } => "Cancel Event",
            Action::SelectEvent { .. } => "Select Event",
            Action::SaveData {} => "Save Data",
            Action::SendData {} => "Send Data",
        }
    }

    /// The primary item this action refers to, used by the connection
    /// handle to focus the canvas. Stubs have no reference.
    pub fn primary_id(&self) -> ItemId {
        match self {
            Action::NewScene { new_scene } => *new_scene,
            Action::ModifyStatus { status_id, .. } => *status_id,
            Action::CueEvent { event } => event.event_id,
            Action::CancelEvent { event } => *event,
            Action::SelectEvent { status_id, .. } => *status_id,
            Action::SaveData {} | Action::SendData {} => ItemId::none(),
        }
    }

    /// A fresh select-event action for a newly chosen status. Changing the
    /// status invalidates every prior state-to-event assignment, so the map
    /// always starts empty.
    pub fn select_event(status_id: ItemId) -> Action {
        Action::SelectEvent {
            status_id,
            event_map: BTreeMap::new(),
        }
    }
}

/// Convert a delay entered in seconds into the wire form. Values at or
/// below zero mean "no delay"; fractional seconds round to the nearest
/// nanosecond, carrying into the seconds on a full-second rounding.
pub fn delay_from_secs(value: f64) -> Option<Duration> {
    if !(value > 0.0) {
        return None;
    }
    let mut secs = value.trunc() as u64;
    let mut nanos = (value.fract() * 1_000_000_000.0).round() as u32;
    if nanos >= 1_000_000_000 {
        secs += 1;
        nanos = 0;
    }
    Some(Duration::new(secs, nanos))
}

/// Convert a wire delay back to seconds for display. No delay reads as 0.
pub fn delay_as_secs(delay: Option<Duration>) -> f64 {
    delay.map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

/// Keep only the event map entries whose state is still in the allowed set.
/// Entries outside the set are presentation leftovers and must not be
/// submitted with the action.
pub fn prune_event_map(
    event_map: &BTreeMap<u32, ItemId>,
    allowed: &[ItemId],
) -> BTreeMap<u32, ItemId> {
    event_map
        .iter()
        .filter(|(state, _)| allowed.iter().any(|a| a.id() == **state))
        .map(|(state, event)| (*state, *event))
        .collect()
}

/// Rebuild a select-event map with one state's entry replaced, preserving
/// every other entry and dropping any that fell outside the allowed set.
pub fn with_selected_event(
    event_map: &BTreeMap<u32, ItemId>,
    allowed: &[ItemId],
    state: ItemId,
    event: ItemId,
) -> BTreeMap<u32, ItemId> {
    let mut map = prune_event_map(event_map, allowed);
    map.insert(state.id(), event);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> ItemId {
        ItemId::new_unchecked(n)
    }

    #[test]
    fn test_empty_sentinel_rejected() {
        assert!(ItemId::new(0).is_none(), "0 is reserved and must be rejected");
        assert_eq!(ItemId::new(5).unwrap().id(), 5);
        assert!(ItemId::none().is_none());
    }

    #[test]
    fn test_delay_zero_is_no_delay() {
        assert_eq!(delay_from_secs(0.0), None, "zero delay must normalize to absent");
        assert_eq!(delay_from_secs(-1.0), None);
        assert_eq!(delay_as_secs(None), 0.0);
    }

    #[test]
    fn test_delay_round_trip() {
        // Round trip must stay within one nanosecond of the input
        for &v in &[0.5, 1.0, 1.5, 2.25, 10.000000001, 59.999999999] {
            let delay = delay_from_secs(v).expect("positive delay must convert");
            let back = delay_as_secs(Some(delay));
            assert!(
                (back - v).abs() <= 1e-9,
                "delay {} round-tripped to {}",
                v,
                back
            );
        }
    }

    #[test]
    fn test_delay_nanos_carry() {
        // A fraction that rounds up to a whole second must carry cleanly
        let delay = delay_from_secs(1.9999999999).unwrap();
        assert_eq!(delay, Duration::new(2, 0), "rounding must carry into seconds");
    }

    #[test]
    fn test_event_delay_normalizes_zero() {
        let event = EventDelay::new(id(8), Some(Duration::new(0, 0)));
        assert_eq!(event.delay, None, "explicit zero duration must become None");

        let event = EventDelay::new(id(8), Some(Duration::new(0, 1)));
        assert!(event.delay.is_some());
    }

    #[test]
    fn test_new_status_resets_event_map() {
        let action = Action::select_event(id(3));
        match action {
            Action::SelectEvent { status_id, event_map } => {
                assert_eq!(status_id, id(3));
                assert!(event_map.is_empty(), "new status must reset the map");
            }
            other => panic!("expected SelectEvent, got {:?}", other),
        }
    }

    #[test]
    fn test_selected_event_preserves_other_entries() {
        let mut map = BTreeMap::new();
        map.insert(10, id(100));
        map.insert(11, id(101));
        let allowed = [id(10), id(11), id(12)];

        let updated = with_selected_event(&map, &allowed, id(12), id(102));
        assert_eq!(updated.get(&10), Some(&id(100)), "untouched entry must survive");
        assert_eq!(updated.get(&11), Some(&id(101)), "untouched entry must survive");
        assert_eq!(updated.get(&12), Some(&id(102)));
    }

    #[test]
    fn test_stale_entries_pruned_on_emission() {
        let mut map = BTreeMap::new();
        map.insert(10, id(100));
        map.insert(99, id(200)); // no longer an allowed state
        let allowed = [id(10), id(11)];

        let updated = with_selected_event(&map, &allowed, id(11), id(101));
        assert_eq!(updated.get(&10), Some(&id(100)));
        assert_eq!(updated.get(&11), Some(&id(101)));
        assert!(!updated.contains_key(&99), "stale entry must not be submitted");
    }

    #[test]
    fn test_wire_shapes() {
        // The serde form must match the backend wire exactly
        let action = Action::NewScene { new_scene: id(5) };
        assert_eq!(
            serde_json::to_string(&action).unwrap(),
            r#"{"NewScene":{"new_scene":{"id":5}}}"#
        );

        let action = Action::CueEvent {
            event: EventDelay::new(id(7), Some(Duration::new(1, 500_000_000))),
        };
        assert_eq!(
            serde_json::to_string(&action).unwrap(),
            r#"{"CueEvent":{"event":{"event_id":{"id":7},"delay":{"secs":1,"nanos":500000000}}}}"#
        );

        // No delay serializes with the field absent, not {0,0}
        let action = Action::CueEvent {
            event: EventDelay::new(id(7), delay_from_secs(0.0)),
        };
        assert_eq!(
            serde_json::to_string(&action).unwrap(),
            r#"{"CueEvent":{"event":{"event_id":{"id":7}}}}"#
        );

        let mut event_map = BTreeMap::new();
        event_map.insert(22, id(9));
        let action = Action::SelectEvent {
            status_id: id(4),
            event_map,
        };
        assert_eq!(
            serde_json::to_string(&action).unwrap(),
            r#"{"SelectEvent":{"status_id":{"id":4},"event_map":{"22":{"id":9}}}}"#
        );

        let action = Action::SaveData {};
        assert_eq!(serde_json::to_string(&action).unwrap(), r#"{"SaveData":{}}"#);
    }

    #[test]
    fn test_wire_round_trip() {
        let json = r#"{"CueEvent":{"event":{"event_id":{"id":7},"delay":{"secs":2,"nanos":0}}}}"#;
        let action: Action = serde_json::from_str(json).unwrap();
        assert_eq!(
            action,
            Action::CueEvent {
                event: EventDelay::new(id(7), Some(Duration::new(2, 0))),
            }
        );

        // A cue without a delay field parses as no delay
        let json = r#"{"CueEvent":{"event":{"event_id":{"id":7}}}}"#;
        let action: Action = serde_json::from_str(json).unwrap();
        assert_eq!(
            action,
            Action::CueEvent {
                event: EventDelay::new(id(7), None),
            }
        );
    }
}
