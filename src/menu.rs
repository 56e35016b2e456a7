use crate::model::ItemId;

/// What kind of item a picker offers.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PickerKind {
    Scene,
    Status,
    State,
    Event,
}

/// Where a picked id is routed once the user selects it. The arbiter does
/// not interpret this; the application shell does.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PickerTarget {
    NewScene { action: usize },
    CueEvent { action: usize },
    CancelEvent { action: usize },
    ModifyStatusStatus { action: usize },
    ModifyStatusState { action: usize },
    SelectEventStatus { action: usize },
    SelectEventEntry { action: usize, state: ItemId },
    StateReference { index: usize },
}

/// A contextual picker request. Pickers are opaque to the rest of the
/// editor: they only ever emit a selected id. When `candidates` is present
/// the picker is restricted to that list; otherwise any id may be entered.
#[derive(Clone, PartialEq, Debug)]
pub struct PickerSpec {
    pub kind: PickerKind,
    pub target: PickerTarget,
    pub candidates: Option<Vec<ItemId>>,
}

impl PickerSpec {
    pub fn open(kind: PickerKind, target: PickerTarget) -> PickerSpec {
        PickerSpec {
            kind,
            target,
            candidates: None,
        }
    }

    pub fn restricted(kind: PickerKind, target: PickerTarget, candidates: Vec<ItemId>) -> PickerSpec {
        PickerSpec {
            kind,
            target,
            candidates: Some(candidates),
        }
    }
}

/// Proof of a claim on the menu slot. Tokens are never reused, so a token
/// from an overwritten claim goes stale instead of aliasing the new owner.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MenuToken(u64);

/// Single-slot registry deciding which contextual picker is visible. At
/// most one picker is open anywhere in the editor at a time.
///
/// `claim` always succeeds and overwrites whatever was open; the previous
/// owner finds out because its token stops being current. Ownership is
/// tracked by token rather than by each editor's own visibility flag, so a
/// stale `release` from an overwritten editor cannot close a newer claim.
pub struct MenuArbiter {
    current: Option<(MenuToken, PickerSpec)>,
    next_token: u64,
}

impl MenuArbiter {
    pub fn new() -> MenuArbiter {
        MenuArbiter {
            current: None,
            next_token: 1,
        }
    }

    /// Claim the slot for a picker. Unconditionally replaces any picker
    /// already open.
    pub fn claim(&mut self, picker: PickerSpec) -> MenuToken {
        let token = MenuToken(self.next_token);
        self.next_token += 1;
        self.current = Some((token, picker));
        token
    }

    /// Release the slot, but only if `token` still owns it. A stale token
    /// is a no-op.
    pub fn release(&mut self, token: MenuToken) {
        if self.is_current(token) {
            self.current = None;
        }
    }

    /// Close whatever is open. Used when clicking away from any editor.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Whether this token still owns the slot.
    pub fn is_current(&self, token: MenuToken) -> bool {
        matches!(self.current, Some((current, _)) if current == token)
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// The picker currently holding the slot, if any.
    pub fn current(&self) -> Option<(MenuToken, &PickerSpec)> {
        self.current.as_ref().map(|(token, spec)| (*token, spec))
    }

    /// Whether the open picker targets this field. Editors derive their
    /// "am I editing" highlight from this instead of a local flag.
    pub fn target_open(&self, target: PickerTarget) -> bool {
        matches!(&self.current, Some((_, spec)) if spec.target == target)
    }

    /// The symmetric open/close convention used by every editor: if this
    /// field's picker is open, release it; otherwise claim the slot (which
    /// closes whatever else was open).
    pub fn toggle(&mut self, picker: PickerSpec) {
        match self.current() {
            Some((token, current)) if current.target == picker.target => self.release(token),
            _ => {
                self.claim(picker);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(action: usize) -> PickerSpec {
        PickerSpec::open(PickerKind::Event, PickerTarget::CueEvent { action })
    }

    #[test]
    fn test_claim_and_release() {
        let mut arbiter = MenuArbiter::new();
        assert!(!arbiter.is_open());

        let token = arbiter.claim(spec(0));
        assert!(arbiter.is_current(token));
        assert!(arbiter.is_open());

        arbiter.release(token);
        assert!(!arbiter.is_open());
        assert!(!arbiter.is_current(token));
    }

    #[test]
    fn test_claim_twice_succeeds_both_times() {
        // Claiming without an intervening release still succeeds; the
        // second claim simply displaces the first.
        let mut arbiter = MenuArbiter::new();
        let first = arbiter.claim(spec(0));
        let second = arbiter.claim(spec(1));

        assert!(!arbiter.is_current(first), "displaced claim must go stale");
        assert!(arbiter.is_current(second));
        match arbiter.current() {
            Some((_, picker)) => assert_eq!(picker.target, PickerTarget::CueEvent { action: 1 }),
            None => panic!("slot should hold the second picker"),
        }
    }

    #[test]
    fn test_stale_release_does_not_clobber() {
        let mut arbiter = MenuArbiter::new();
        let first = arbiter.claim(spec(0));
        let second = arbiter.claim(spec(1));

        // The first editor closing itself must not close the second's menu
        arbiter.release(first);
        assert!(arbiter.is_open(), "stale release must be a no-op");
        assert!(arbiter.is_current(second));

        arbiter.release(second);
        assert!(!arbiter.is_open());
    }

    #[test]
    fn test_toggle_is_symmetric() {
        let mut arbiter = MenuArbiter::new();

        // First toggle opens
        arbiter.toggle(spec(0));
        assert!(arbiter.target_open(PickerTarget::CueEvent { action: 0 }));

        // Toggling a different field switches, it does not stack
        arbiter.toggle(spec(1));
        assert!(!arbiter.target_open(PickerTarget::CueEvent { action: 0 }));
        assert!(arbiter.target_open(PickerTarget::CueEvent { action: 1 }));

        // Toggling the open field closes it
        arbiter.toggle(spec(1));
        assert!(!arbiter.is_open());
    }

    #[test]
    fn test_clear_closes_anything() {
        let mut arbiter = MenuArbiter::new();
        let token = arbiter.claim(spec(0));
        arbiter.clear();
        assert!(!arbiter.is_open());
        assert!(!arbiter.is_current(token));
    }
}
