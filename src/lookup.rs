use crate::model::ItemId;
use anyhow::{anyhow, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

/// Placeholder shown until a description resolves.
pub const LOADING: &str = "Loading ...";

/// Display text for the empty sentinel. Never looked up.
pub const NONE: &str = "None";

/// An id with its human-readable description, as the lookup service
/// returns it.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ItemPair {
    pub id: u32,
    pub description: String,
}

/// Reply body of `getItem/{id}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemReply {
    pub item: ItemInfo,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemInfo {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    #[serde(rename = "itemPair")]
    pub item_pair: ItemPair,
}

/// Reply body of `getStatus/{id}`. Only the multi-state shape is consumed
/// by the editor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: StatusInfo,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusInfo {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    pub status: StatusKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StatusKind {
    MultiState { allowed: Vec<ItemPair> },
}

/// The black-box description service. Transport and auth live behind this
/// boundary; the editor only ever asks for items and statuses.
pub trait ItemSource: Send + 'static {
    fn get_item(&self, id: ItemId) -> Result<ItemReply>;
    fn get_status(&self, id: ItemId) -> Result<StatusReply>;
}

/// Requests served by the background lookup worker.
pub enum LookupRequest {
    /// Resolve one item description.
    Item(ItemId),
    /// Resolve a status description, the allowed-states list and optionally
    /// one target state description, committed together or not at all.
    StatusBundle {
        status_id: ItemId,
        state_id: Option<ItemId>,
    },
}

/// Replies sent back to the UI thread.
pub enum LookupReply {
    Item {
        id: ItemId,
        description: String,
    },
    StatusBundle {
        status_id: ItemId,
        description: String,
        state: Option<(ItemId, String)>,
        allowed: Vec<ItemPair>,
    },
}

/// Spawn the lookup worker. The UI sends requests down the returned sender
/// and drains replies from the receiver once per frame; a dropped channel
/// ends the worker.
pub fn start_lookup_service(
    source: impl ItemSource,
) -> (Sender<LookupRequest>, Receiver<LookupReply>) {
    let (request_send, request_recv) = channel::<LookupRequest>();
    let (reply_send, reply_recv) = channel::<LookupReply>();

    thread::spawn(move || {
        debug!("[LOOKUP] Background lookup service started");
        while let Ok(request) = request_recv.recv() {
            // Failures are swallowed here: the UI keeps whatever it was
            // already displaying and the user can re-trigger the lookup.
            match serve(&source, request) {
                Ok(reply) => {
                    if reply_send.send(reply).is_err() {
                        break; // UI gone
                    }
                }
                Err(e) => warn!("[LOOKUP] Request failed: {}", e),
            }
        }
        debug!("[LOOKUP] Background lookup service stopped");
    });

    (request_send, reply_recv)
}

// Serve one request against the source.
fn serve(source: &impl ItemSource, request: LookupRequest) -> Result<LookupReply> {
    match request {
        LookupRequest::Item(id) => lookup_item(source, id),
        LookupRequest::StatusBundle {
            status_id,
            state_id,
        } => lookup_status_bundle(source, status_id, state_id),
    }
}

fn lookup_item(source: &impl ItemSource, id: ItemId) -> Result<LookupReply> {
    let reply = source.get_item(id)?;
    if !reply.item.is_valid {
        return Err(anyhow!("item {} did not resolve", id));
    }
    Ok(LookupReply::Item {
        id,
        description: reply.item.item_pair.description,
    })
}

// The three lookups run in a fixed sequence and commit together; any
// invalid piece discards the whole bundle.
fn lookup_status_bundle(
    source: &impl ItemSource,
    status_id: ItemId,
    state_id: Option<ItemId>,
) -> Result<LookupReply> {
    let status_item = source.get_item(status_id)?;
    if !status_item.item.is_valid {
        return Err(anyhow!("status {} did not resolve", status_id));
    }

    let state = match state_id.filter(|id| !id.is_none()) {
        Some(id) => {
            let state_item = source.get_item(id)?;
            if !state_item.item.is_valid {
                return Err(anyhow!("state {} did not resolve", id));
            }
            Some((id, state_item.item.item_pair.description))
        }
        None => None,
    };

    let status = source.get_status(status_id)?;
    if !status.status.is_valid {
        return Err(anyhow!("status {} has no state information", status_id));
    }
    let StatusKind::MultiState { allowed } = status.status.status;

    Ok(LookupReply::StatusBundle {
        status_id,
        description: status_item.item.item_pair.description,
        state,
        allowed,
    })
}

/// Frame-polled cache of resolved descriptions and allowed-state lists.
/// Lookups are fire-and-forget: a reply that arrives after the user has
/// moved on still applies silently (accepted staleness window), and a
/// failed lookup leaves the previous entry in place.
pub struct ItemCache {
    request_send: Sender<LookupRequest>,
    reply_recv: Receiver<LookupReply>,
    descriptions: HashMap<ItemId, String>,
    allowed_states: HashMap<ItemId, Vec<ItemPair>>,
    requested_items: HashSet<ItemId>,
    requested_bundles: HashSet<(ItemId, Option<ItemId>)>,
}

impl ItemCache {
    pub fn new(source: impl ItemSource) -> ItemCache {
        let (request_send, reply_recv) = start_lookup_service(source);
        ItemCache {
            request_send,
            reply_recv,
            descriptions: HashMap::new(),
            allowed_states: HashMap::new(),
            requested_items: HashSet::new(),
            requested_bundles: HashSet::new(),
        }
    }

    /// Drain and apply any replies that arrived since the last frame. Each
    /// bundle is applied in one step so partial state never shows.
    pub fn poll(&mut self) {
        while let Ok(reply) = self.reply_recv.try_recv() {
            match reply {
                LookupReply::Item { id, description } => {
                    self.descriptions.insert(id, description);
                }
                LookupReply::StatusBundle {
                    status_id,
                    description,
                    state,
                    allowed,
                } => {
                    self.descriptions.insert(status_id, description);
                    if let Some((state_id, state_description)) = state {
                        self.descriptions.insert(state_id, state_description);
                    }
                    self.allowed_states.insert(status_id, allowed);
                }
            }
        }
    }

    /// Request an item description unless it is the sentinel or already
    /// in flight. A changed reference is a new id, so it naturally issues
    /// a fresh request.
    pub fn ensure_item(&mut self, id: ItemId) {
        if id.is_none() || !self.requested_items.insert(id) {
            return;
        }
        debug!("[LOOKUP] Requesting item {}", id);
        let _ = self.request_send.send(LookupRequest::Item(id));
    }

    /// Request a status bundle (status description, allowed list, optional
    /// target state description), keyed by both ids so a changed target
    /// re-resolves the whole bundle together.
    pub fn ensure_status(&mut self, status_id: ItemId, state_id: Option<ItemId>) {
        if status_id.is_none() || !self.requested_bundles.insert((status_id, state_id)) {
            return;
        }
        debug!("[LOOKUP] Requesting status bundle {} / {:?}", status_id, state_id);
        let _ = self.request_send.send(LookupRequest::StatusBundle {
            status_id,
            state_id,
        });
    }

    /// The best description currently known for an id. Never fails: the
    /// sentinel reads as "None" and anything unresolved as the loading
    /// placeholder.
    pub fn description(&self, id: ItemId) -> &str {
        if id.is_none() {
            return NONE;
        }
        self.descriptions
            .get(&id)
            .map(|d| d.as_str())
            .unwrap_or(LOADING)
    }

    /// The allowed states of a status, once resolved.
    pub fn allowed_states(&self, status_id: ItemId) -> &[ItemPair] {
        self.allowed_states
            .get(&status_id)
            .map(|a| a.as_slice())
            .unwrap_or(&[])
    }
}

/// In-memory source used by the demo wiring and the tests. Real transport
/// plugs in behind the same trait.
pub struct DemoSource {
    items: HashMap<u32, String>,
    statuses: HashMap<u32, Vec<u32>>,
}

impl DemoSource {
    pub fn new() -> DemoSource {
        DemoSource {
            items: HashMap::new(),
            statuses: HashMap::new(),
        }
    }

    pub fn with_item(mut self, id: u32, description: &str) -> DemoSource {
        self.items.insert(id, description.to_string());
        self
    }

    /// Register a status; its allowed states must also be added as items.
    pub fn with_status(mut self, id: u32, description: &str, allowed: &[u32]) -> DemoSource {
        self.items.insert(id, description.to_string());
        self.statuses.insert(id, allowed.to_vec());
        self
    }
}

impl ItemSource for DemoSource {
    fn get_item(&self, id: ItemId) -> Result<ItemReply> {
        let (is_valid, description) = match self.items.get(&id.id()) {
            Some(description) => (true, description.clone()),
            None => (false, String::new()),
        };
        Ok(ItemReply {
            item: ItemInfo {
                is_valid,
                item_pair: ItemPair {
                    id: id.id(),
                    description,
                },
            },
        })
    }

    fn get_status(&self, id: ItemId) -> Result<StatusReply> {
        let (is_valid, allowed) = match self.statuses.get(&id.id()) {
            Some(states) => (
                true,
                states
                    .iter()
                    .map(|state| ItemPair {
                        id: *state,
                        description: self.items.get(state).cloned().unwrap_or_default(),
                    })
                    .collect(),
            ),
            None => (false, Vec::new()),
        };
        Ok(StatusReply {
            status: StatusInfo {
                is_valid,
                status: StatusKind::MultiState { allowed },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn id(n: u32) -> ItemId {
        ItemId::new_unchecked(n)
    }

    fn demo() -> DemoSource {
        DemoSource::new()
            .with_item(5, "House Lights")
            .with_item(7, "Intermission")
            .with_status(20, "Show Phase", &[5, 7])
    }

    #[test]
    fn test_item_lookup_resolves() {
        let reply = lookup_item(&demo(), id(5)).unwrap();
        match reply {
            LookupReply::Item { id: item, description } => {
                assert_eq!(item, id(5));
                assert_eq!(description, "House Lights");
            }
            _ => panic!("expected an item reply"),
        }
    }

    #[test]
    fn test_unknown_item_is_an_error() {
        assert!(
            lookup_item(&demo(), id(99)).is_err(),
            "invalid items must not produce a reply"
        );
    }

    #[test]
    fn test_status_bundle_commits_together() {
        let reply = lookup_status_bundle(&demo(), id(20), Some(id(5))).unwrap();
        match reply {
            LookupReply::StatusBundle {
                status_id,
                description,
                state,
                allowed,
            } => {
                assert_eq!(status_id, id(20));
                assert_eq!(description, "Show Phase");
                assert_eq!(state, Some((id(5), "House Lights".to_string())));
                let allowed_ids: Vec<u32> = allowed.iter().map(|a| a.id).collect();
                assert_eq!(allowed_ids, vec![5, 7]);
            }
            _ => panic!("expected a status bundle"),
        }
    }

    #[test]
    fn test_partial_bundle_is_discarded() {
        // Status resolves but the target state does not: nothing commits
        assert!(
            lookup_status_bundle(&demo(), id(20), Some(id(99))).is_err(),
            "partial success must be discarded"
        );
        // The status itself is unknown
        assert!(lookup_status_bundle(&demo(), id(99), None).is_err());
    }

    #[test]
    fn test_cache_applies_replies() {
        let mut cache = ItemCache::new(demo());
        assert_eq!(cache.description(id(5)), LOADING);
        assert_eq!(cache.description(ItemId::none()), NONE);

        cache.ensure_item(id(5));
        cache.ensure_status(id(20), None);

        // The worker runs on its own thread; poll until it answers
        for _ in 0..200 {
            cache.poll();
            if cache.description(id(5)) != LOADING && !cache.allowed_states(id(20)).is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(cache.description(id(5)), "House Lights");
        assert_eq!(cache.description(id(20)), "Show Phase");
        assert_eq!(cache.allowed_states(id(20)).len(), 2);
    }

    #[test]
    fn test_failed_lookup_keeps_prior_description() {
        let mut cache = ItemCache::new(demo());
        cache.ensure_item(id(99));
        for _ in 0..20 {
            cache.poll();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(
            cache.description(id(99)),
            LOADING,
            "an unresolved id must keep its placeholder, not blank or error"
        );
    }

    #[test]
    fn test_wire_shapes_parse() {
        let json = r#"{"item":{"isValid":true,"itemPair":{"id":5,"description":"House Lights"}}}"#;
        let reply: ItemReply = serde_json::from_str(json).unwrap();
        assert!(reply.item.is_valid);
        assert_eq!(reply.item.item_pair.description, "House Lights");

        let json = r#"{"status":{"isValid":true,"status":{"MultiState":{"allowed":[{"id":5,"description":"Open"},{"id":7,"description":"Closed"}]}}}}"#;
        let reply: StatusReply = serde_json::from_str(json).unwrap();
        assert!(reply.status.is_valid);
        let StatusKind::MultiState { allowed } = reply.status.status;
        assert_eq!(allowed.len(), 2);
    }
}
