//!
//! The generic controller: the interaction API of the storage engine.
//!
//! Every actor (sensor, shield, UI, replication agent) manipulates data
//! through a [`Controller`]. It relays requests to the configured
//! [`StorageMapper`], enforces owner defaulting and the clone-then-mutate
//! discipline for value edits, cascades child payloads with an explicit
//! bounded worklist, and drives change notification after every committed
//! mutation.
//!
//! `Controller` is a cheap-to-clone handle around shared internal state.
//! Skeleton nodes resolve through a weak loader handle, so dropping the
//! last controller handle invalidates outstanding skeletons instead of
//! leaking the engine.

pub mod errors;

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock, Weak};

use uuid::Uuid;

use crate::constants::{
    BASE_NODES, CURRENT_DEVICE, CURRENT_USER, DEVICES_PATH, LOCAL_PATH, MAX_CASCADE_NODES,
    PATH_DELIMITER, USERS_PATH,
};
use crate::events::{ChangeListener, ChangeRegistry, Dispatcher, EventType};
use crate::mapper::StorageMapper;
use crate::node::{self, Node, NodeError, NodeLoader, NodeValue};
use crate::path;
use crate::search::SearchCriteria;

pub use errors::ControllerError;

struct ControllerInner {
    /// Default owner stamped onto nodes added without one.
    owner: String,
    /// The persistence backend; synchronizes internally.
    mapper: Arc<dyn StorageMapper>,
    /// Registered (criteria, listener) pairs.
    registry: ChangeRegistry,
    /// Worker pool delivering events off the mutating thread.
    dispatcher: Dispatcher,
    /// Canonical loader handle; one identity per controller.
    loader: OnceLock<Arc<dyn NodeLoader>>,
}

/// Loader capability backed by a weak controller reference.
#[derive(Debug)]
struct LoaderHandle(Weak<ControllerInner>);

impl NodeLoader for LoaderHandle {
    fn load(&self, node_path: &str) -> crate::Result<Node> {
        let inner = self.0.upgrade().ok_or(ControllerError::ControllerGone)?;
        inner.mapper.get(node_path)
    }
}

/// The interaction API over a storage mapper.
pub struct Controller {
    inner: Arc<ControllerInner>,
}

impl Clone for Controller {
    fn clone(&self) -> Self {
        Controller {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("owner", &self.inner.owner)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Creates a controller over a mapper and bootstraps the base tree.
    ///
    /// Bootstrap ensures the fixed root-level containers exist and that
    /// `:Local` carries `currentUser`/`currentDevice` identifiers, which
    /// are generated on first run and reused afterwards (also across
    /// controller reconstruction over the same mapper).
    pub fn new(owner: impl Into<String>, mapper: Arc<dyn StorageMapper>) -> crate::Result<Self> {
        let inner = Arc::new(ControllerInner {
            owner: owner.into(),
            mapper,
            registry: ChangeRegistry::new(),
            dispatcher: Dispatcher::new(),
            loader: OnceLock::new(),
        });
        let loader: Arc<dyn NodeLoader> = Arc::new(LoaderHandle(Arc::downgrade(&inner)));
        let _ = inner.loader.set(Arc::clone(&loader));
        inner.mapper.set_loader(loader);
        inner.bootstrap()?;
        Ok(Controller { inner })
    }

    /// The default owner stamped onto added nodes.
    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    /// The loader capability of this controller, for binding skeletons
    /// and decode contexts.
    pub fn loader(&self) -> Arc<dyn NodeLoader> {
        self.inner.loader()
    }

    /// Adds a single node. The payload's children are not registered by
    /// this call; use [`update`](Self::update) or
    /// [`add_or_update`](Self::add_or_update) to commit a subtree.
    ///
    /// Sets the owner to the controller default if unset and fires a
    /// `Create` event on success.
    pub fn add(&self, node: &Node) -> crate::Result<()> {
        self.inner.add_one(node)
    }

    /// Updates a node and cascades through every non-skeleton child in
    /// the payload (add, or update on conflict), letting one call commit
    /// an entire subtree. The cascade is sequential, not atomic: children
    /// committed before a failure stay committed.
    pub fn update(&self, node: &Node) -> crate::Result<()> {
        self.inner.update_one(node)?;
        self.inner.apply_children(node)
    }

    /// Adds or updates a node and its payload subtree.
    ///
    /// Skeletons are ignored; a tombstone payload routes to
    /// [`delete`](Self::delete) (idempotently, so deletion state can be
    /// replayed from a replica). Only `AlreadyExists` downgrades an add
    /// to an update — every other error propagates. Returns whether a
    /// new record was created at the top level.
    pub fn add_or_update(&self, node: &Node) -> crate::Result<bool> {
        if node.is_skeleton() {
            return Ok(false);
        }
        if node.is_tombstone() {
            match self.inner.delete_path(node.path()) {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
            return Ok(false);
        }
        let created = match self.inner.add_one(node) {
            Ok(()) => true,
            Err(e) if e.is_already_exists() => {
                self.inner.update_one(node)?;
                false
            }
            Err(e) => return Err(e),
        };
        self.inner.apply_children(node)?;
        Ok(created)
    }

    /// Fetches a materialized node, hiding deletion state: returns
    /// `None` when the path resolves to a tombstone or was never stored,
    /// and prunes tombstoned children from the result.
    pub fn get(&self, node_path: &str) -> crate::Result<Option<Node>> {
        let node = match self.inner.mapper.get(node_path) {
            Ok(node) => node,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        if node.is_tombstone() {
            return Ok(None);
        }
        let tombstoned: Vec<String> = node
            .children()?
            .into_iter()
            .filter(|(_, child)| child.is_tombstone())
            .map(|(name, _)| name)
            .collect();
        for name in &tombstoned {
            node.remove_child(name)?;
        }
        Ok(Some(node))
    }

    /// Fetches a node without hiding deletion state, for replication-
    /// aware callers: a deleted path yields its tombstone.
    pub fn get_node_or_tombstone(&self, node_path: &str) -> crate::Result<Node> {
        self.inner.mapper.get(node_path)
    }

    /// Deletes a leaf node, leaving a tombstone, and fires a `Delete`
    /// event carrying the removed node. The mapper refuses to delete
    /// nodes with live children.
    pub fn delete(&self, node_path: &str) -> crate::Result<Node> {
        self.inner.delete_path(node_path)
    }

    /// Renames or moves a node together with all descendants.
    ///
    /// An identifier without a path delimiter renames in place (the
    /// parent is kept); a fully qualified path moves the subtree. The
    /// move is add-new-then-delete-old and not atomic: a crash in
    /// between can transiently leave both subtrees.
    pub fn rename(&self, old_path: &str, new_name_or_path: &str) -> crate::Result<()> {
        let old = self.inner.mapper.get(old_path)?;
        let new_path = if new_name_or_path.starts_with(PATH_DELIMITER) {
            new_name_or_path.to_string()
        } else {
            path::join(old.parent_path(), new_name_or_path)
        };
        self.inner.mapper.rename(old_path, &new_path)?;
        let new = self.inner.mapper.get(&new_path)?;
        self.inner.notify(EventType::Rename, Some(&old), Some(&new));
        Ok(())
    }

    /// Fetches a single value from a node.
    pub fn get_value(&self, node_path: &str, key: &str) -> crate::Result<Option<NodeValue>> {
        self.inner.mapper.get_value(node_path, key)
    }

    /// Adds a value to a node; the key must not exist yet.
    ///
    /// The stored node is never mutated in place: the new state is built
    /// on a deep clone so the pre-image used for notification stays
    /// untouched.
    pub fn add_value(&self, node_path: &str, value: NodeValue) -> crate::Result<()> {
        let old = self.inner.mapper.get(node_path)?;
        if old.value(value.key())?.is_some() {
            return Err(NodeError::ValueAlreadyExists {
                key: value.key().to_string(),
                path: node_path.to_string(),
            }
            .into());
        }
        let new = old.deep_clone();
        new.add_value(value)?;
        self.inner.mapper.update(&new)?;
        self.inner.notify(EventType::Update, Some(&old), Some(&new));
        Ok(())
    }

    /// Replaces an existing value on a node.
    pub fn update_value(&self, node_path: &str, value: NodeValue) -> crate::Result<()> {
        let old = self.inner.mapper.get(node_path)?;
        if old.value(value.key())?.is_none() {
            return Err(NodeError::ValueNotFound {
                key: value.key().to_string(),
                path: node_path.to_string(),
            }
            .into());
        }
        let new = old.deep_clone();
        new.update_value(value)?;
        self.inner.mapper.update(&new)?;
        self.inner.notify(EventType::Update, Some(&old), Some(&new));
        Ok(())
    }

    /// Removes a value from a node, returning it.
    pub fn delete_value(&self, node_path: &str, key: &str) -> crate::Result<NodeValue> {
        let old = self.inner.mapper.get(node_path)?;
        let Some(old_value) = old.value(key)? else {
            return Err(NodeError::ValueNotFound {
                key: key.to_string(),
                path: node_path.to_string(),
            }
            .into());
        };
        let new = old.deep_clone();
        new.remove_value(key)?;
        self.inner.mapper.update(&new)?;
        self.inner.notify(EventType::Update, Some(&old), Some(&new));
        Ok(old_value)
    }

    /// All stored nodes matching the criteria.
    pub fn search(&self, criteria: &SearchCriteria) -> crate::Result<Vec<Node>> {
        self.inner.mapper.search(criteria)
    }

    /// Registers a listener invoked for every committed mutation
    /// matching `criteria`.
    pub fn register_change_listener(
        &self,
        listener: Arc<dyn ChangeListener>,
        criteria: SearchCriteria,
    ) {
        self.inner.registry.register(listener, criteria);
    }

    /// Removes every registration of `listener`, returning the criteria
    /// it was registered under.
    pub fn deregister_change_listener(
        &self,
        listener: &Arc<dyn ChangeListener>,
    ) -> Vec<SearchCriteria> {
        self.inner.registry.deregister(listener)
    }

    /// Flushes the mapper.
    pub fn flush(&self) -> crate::Result<()> {
        self.inner.mapper.flush()
    }

    /// Closes the mapper.
    pub fn close(&self) -> crate::Result<()> {
        self.inner.mapper.close()
    }

    /// Truncates all storage and re-establishes the bootstrap tree,
    /// including fresh identity values.
    pub fn zap(&self) -> crate::Result<()> {
        self.inner.mapper.zap()?;
        self.inner.bootstrap()
    }
}

impl ControllerInner {
    fn loader(&self) -> Arc<dyn NodeLoader> {
        self.loader
            .get()
            .cloned()
            .unwrap_or_else(node::detached_loader)
    }

    /// Dispatches to matching listeners unless the mutation produced no
    /// observable diff.
    fn notify(&self, event: EventType, old: Option<&Node>, new: Option<&Node>) {
        if let (Some(o), Some(n)) = (old, new)
            && o == n
        {
            return;
        }
        for listener in self.registry.matching(old, new) {
            self.dispatcher.dispatch(event, old, new, listener);
        }
    }

    fn default_owner(&self, node: &Node) -> crate::Result<()> {
        if node.owner()?.as_deref().is_none_or(str::is_empty) {
            node.set_owner(self.owner.clone())?;
        }
        Ok(())
    }

    fn add_one(&self, node: &Node) -> crate::Result<()> {
        self.default_owner(node)?;
        self.mapper.add(node)?;
        self.notify(EventType::Create, None, Some(node));
        Ok(())
    }

    fn update_one(&self, node: &Node) -> crate::Result<()> {
        self.default_owner(node)?;
        let old = self.mapper.get(node.path())?;
        self.mapper.update(node)?;
        self.notify(EventType::Update, Some(&old), Some(node));
        Ok(())
    }

    fn delete_path(&self, node_path: &str) -> crate::Result<Node> {
        let removed = self.mapper.delete(node_path)?;
        self.notify(EventType::Delete, Some(&removed), None);
        Ok(removed)
    }

    /// Commits a payload's child subtree with an explicit worklist:
    /// skeletons are skipped, tombstones route to delete, everything
    /// else is added (or updated on conflict). Bounded by
    /// [`MAX_CASCADE_NODES`]; on overrun the already committed prefix
    /// stays committed.
    fn apply_children(&self, root: &Node) -> crate::Result<()> {
        let mut queue: VecDeque<Node> = root.children()?.into_values().collect();
        let mut visited = 0usize;
        while let Some(child) = queue.pop_front() {
            if child.is_skeleton() {
                continue;
            }
            visited += 1;
            if visited > MAX_CASCADE_NODES {
                return Err(ControllerError::CascadeLimitExceeded {
                    limit: MAX_CASCADE_NODES,
                    path: root.path().to_string(),
                }
                .into());
            }
            if child.is_tombstone() {
                match self.delete_path(child.path()) {
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e),
                }
                continue;
            }
            match self.add_one(&child) {
                Ok(()) => {}
                Err(e) if e.is_already_exists() => self.update_one(&child)?,
                Err(e) => return Err(e),
            }
            queue.extend(child.children()?.into_values());
        }
        Ok(())
    }

    /// Ensures the base containers and identity values exist. Idempotent
    /// over an already bootstrapped mapper.
    fn bootstrap(&self) -> crate::Result<()> {
        for base in BASE_NODES {
            self.ensure_node(base)?;
        }
        let user = self.ensure_identity(CURRENT_USER)?;
        self.ensure_node(&path::join(USERS_PATH, &user))?;
        let device = self.ensure_identity(CURRENT_DEVICE)?;
        self.ensure_node(&path::join(DEVICES_PATH, &device))?;
        Ok(())
    }

    fn ensure_node(&self, node_path: &str) -> crate::Result<()> {
        let missing = match self.mapper.get(node_path) {
            Ok(node) => node.is_tombstone(),
            Err(e) if e.is_not_found() => true,
            Err(e) => return Err(e),
        };
        if missing {
            self.mapper.add(&Node::new(node_path))?;
        }
        Ok(())
    }

    /// Returns the stored identity for `key` on `:Local`, generating and
    /// persisting a fresh identifier on first run.
    fn ensure_identity(&self, key: &str) -> crate::Result<String> {
        let local = self.mapper.get(LOCAL_PATH)?;
        if let Some(value) = local.value(key)? {
            return Ok(value.value().to_string());
        }
        let id = Uuid::new_v4().to_string();
        local.add_value(NodeValue::new(key, id.clone()))?;
        self.mapper.update(&local)?;
        Ok(id)
    }
}
