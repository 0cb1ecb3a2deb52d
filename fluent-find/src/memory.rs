//! An in-memory accessibility tree.
//!
//! Useful for exercising automation logic without a desktop: trees can be
//! built in code or loaded from JSON snapshots, and mutated while a query is
//! polling.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde::{Deserialize, Serialize};

use crate::application::Application;
use crate::condition::{ControlType, PropertyId, PropertyValue};
use crate::element::Element;
use crate::errors::AutomationError;

/// Attributes of a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAttributes {
    pub control_type: ControlType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized_control_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
}

impl ElementAttributes {
    pub fn new(control_type: ControlType) -> Self {
        Self {
            control_type,
            name: None,
            automation_id: None,
            class_name: None,
            help_text: None,
            framework_id: None,
            localized_control_type: None,
            process_id: None,
        }
    }

    pub fn property(&self, id: PropertyId) -> Option<PropertyValue> {
        let text = |value: &Option<String>| value.clone().map(PropertyValue::String);
        match id {
            PropertyId::Name => text(&self.name),
            PropertyId::ClassName => text(&self.class_name),
            PropertyId::HelpText => text(&self.help_text),
            PropertyId::AutomationId => text(&self.automation_id),
            PropertyId::ControlType => Some(PropertyValue::ControlType(self.control_type)),
            PropertyId::FrameworkId => text(&self.framework_id),
            PropertyId::ProcessId => self.process_id.map(|pid| PropertyValue::Int(i64::from(pid))),
            PropertyId::LocalizedControlType => text(&self.localized_control_type),
        }
    }
}

/// Serializable form of a subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    #[serde(flatten)]
    pub attributes: ElementAttributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementSnapshot>,
}

struct Node {
    attributes: RwLock<ElementAttributes>,
    children: RwLock<Vec<MemoryElement>>,
    parent: RwLock<Weak<Node>>,
    alive: AtomicBool,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Handle to a node of an in-memory tree. Clones share the node.
#[derive(Clone)]
pub struct MemoryElement(Arc<Node>);

impl MemoryElement {
    pub fn new(control_type: ControlType) -> Self {
        Self::from_attributes(ElementAttributes::new(control_type))
    }

    pub fn from_attributes(attributes: ElementAttributes) -> Self {
        Self(Arc::new(Node {
            attributes: RwLock::new(attributes),
            children: RwLock::new(Vec::new()),
            parent: RwLock::new(Weak::new()),
            alive: AtomicBool::new(true),
        }))
    }

    fn update(self, change: impl FnOnce(&mut ElementAttributes)) -> Self {
        change(&mut write(&self.0.attributes));
        self
    }

    pub fn with_name(self, name: &str) -> Self {
        self.update(|a| a.name = Some(name.to_string()))
    }

    pub fn with_automation_id(self, id: &str) -> Self {
        self.update(|a| a.automation_id = Some(id.to_string()))
    }

    pub fn with_class_name(self, class_name: &str) -> Self {
        self.update(|a| a.class_name = Some(class_name.to_string()))
    }

    pub fn with_help_text(self, help_text: &str) -> Self {
        self.update(|a| a.help_text = Some(help_text.to_string()))
    }

    pub fn with_framework_id(self, framework_id: &str) -> Self {
        self.update(|a| a.framework_id = Some(framework_id.to_string()))
    }

    pub fn with_localized_control_type(self, localized: &str) -> Self {
        self.update(|a| a.localized_control_type = Some(localized.to_string()))
    }

    pub fn with_process_id(self, pid: u32) -> Self {
        self.update(|a| a.process_id = Some(pid))
    }

    /// Renames the node in place, e.g. to simulate a title change.
    pub fn set_name(&self, name: &str) {
        write(&self.0.attributes).name = Some(name.to_string());
    }

    pub fn attributes(&self) -> ElementAttributes {
        read(&self.0.attributes).clone()
    }

    pub fn name(&self) -> Option<String> {
        read(&self.0.attributes).name.clone()
    }

    pub fn automation_id(&self) -> Option<String> {
        read(&self.0.attributes).automation_id.clone()
    }

    pub fn control_type(&self) -> ControlType {
        read(&self.0.attributes).control_type
    }

    /// Appends `child` as the last child, moving it from its previous parent
    /// if it had one. Returns the child.
    ///
    /// Fails with `InvalidArgument` when `child` is this node or one of its
    /// ancestors, since the tree would become a cycle.
    pub fn append(&self, child: MemoryElement) -> Result<MemoryElement, AutomationError> {
        if self.has_ancestor_or_self(&child) {
            return Err(AutomationError::InvalidArgument(format!(
                "cannot append {child:?} below itself"
            )));
        }
        self.attach(child.clone());
        Ok(child)
    }

    fn attach(&self, child: MemoryElement) {
        child.detach();
        *write(&child.0.parent) = Arc::downgrade(&self.0);
        write(&self.0.children).push(child);
    }

    fn has_ancestor_or_self(&self, node: &MemoryElement) -> bool {
        let mut current = Some(self.0.clone());
        while let Some(candidate) = current {
            if Arc::ptr_eq(&candidate, &node.0) {
                return true;
            }
            current = read(&candidate.parent).upgrade();
        }
        false
    }

    fn detach(&self) {
        let parent = read(&self.0.parent).upgrade();
        if let Some(parent) = parent {
            write(&parent.children).retain(|c| !Arc::ptr_eq(&c.0, &self.0));
        }
        *write(&self.0.parent) = Weak::new();
    }

    /// Removes the node from the tree. The node and everything below it stop
    /// being alive.
    pub fn remove(&self) {
        self.detach();
        self.mark_dead();
    }

    fn mark_dead(&self) {
        self.0.alive.store(false, Ordering::SeqCst);
        for child in read(&self.0.children).iter() {
            child.mark_dead();
        }
    }

    pub fn same_node(&self, other: &MemoryElement) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn from_snapshot(snapshot: &ElementSnapshot) -> Self {
        let element = Self::from_attributes(snapshot.attributes.clone());
        for child in &snapshot.children {
            element.attach(Self::from_snapshot(child));
        }
        element
    }

    pub fn to_snapshot(&self) -> ElementSnapshot {
        ElementSnapshot {
            attributes: self.attributes(),
            children: read(&self.0.children).iter().map(Self::to_snapshot).collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, AutomationError> {
        let snapshot: ElementSnapshot = serde_json::from_str(json)
            .map_err(|e| AutomationError::InvalidArgument(format!("Invalid element snapshot: {e}")))?;
        Ok(Self::from_snapshot(&snapshot))
    }

    pub fn to_json(&self) -> Result<String, AutomationError> {
        serde_json::to_string_pretty(&self.to_snapshot())
            .map_err(|e| AutomationError::Internal(format!("Failed to serialize element tree: {e}")))
    }

    fn ensure_alive(&self) -> Result<(), AutomationError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(AutomationError::ElementDetached(format!("{self:?}")))
        }
    }
}

impl PartialEq for MemoryElement {
    fn eq(&self, other: &Self) -> bool {
        self.same_node(other)
    }
}

impl Eq for MemoryElement {}

impl fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attributes = read(&self.0.attributes);
        let mut debug = f.debug_struct("MemoryElement");
        debug.field("control_type", &attributes.control_type);
        if let Some(name) = &attributes.name {
            debug.field("name", name);
        }
        if let Some(id) = &attributes.automation_id {
            debug.field("automation_id", id);
        }
        debug.finish()
    }
}

impl Element for MemoryElement {
    fn property(&self, id: PropertyId) -> Result<Option<PropertyValue>, AutomationError> {
        self.ensure_alive()?;
        Ok(read(&self.0.attributes).property(id))
    }

    fn children(&self) -> Result<Vec<Self>, AutomationError> {
        self.ensure_alive()?;
        Ok(read(&self.0.children).clone())
    }

    fn parent(&self) -> Result<Option<Self>, AutomationError> {
        self.ensure_alive()?;
        Ok(read(&self.0.parent).upgrade().map(MemoryElement))
    }

    fn is_alive(&self) -> bool {
        self.0.alive.load(Ordering::SeqCst)
    }
}

/// An application whose main window is controlled by the test.
#[derive(Debug)]
pub struct MemoryApplication {
    window: RwLock<Option<MemoryElement>>,
    scheduled: Mutex<Option<(usize, MemoryElement)>>,
    main_window_calls: AtomicUsize,
    close_requests: AtomicUsize,
    exited: AtomicBool,
    exit_on_close: bool,
}

impl Default for MemoryApplication {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryApplication {
    /// A running application without a main window.
    pub fn new() -> Self {
        Self {
            window: RwLock::new(None),
            scheduled: Mutex::new(None),
            main_window_calls: AtomicUsize::new(0),
            close_requests: AtomicUsize::new(0),
            exited: AtomicBool::new(false),
            exit_on_close: true,
        }
    }

    pub fn with_main_window(self, window: MemoryElement) -> Self {
        self.set_main_window(Some(window));
        self
    }

    /// Whether `close` makes the application exit. Defaults to `true`.
    pub fn with_exit_on_close(mut self, exit: bool) -> Self {
        self.exit_on_close = exit;
        self
    }

    pub fn set_main_window(&self, window: Option<MemoryElement>) {
        *write(&self.window) = window;
    }

    /// Destroys the current main window and installs `window` in its place.
    pub fn recreate_main_window(&self, window: MemoryElement) {
        if let Some(old) = write(&self.window).replace(window) {
            old.remove();
        }
    }

    /// Makes `window` the main window once `main_window` has been called
    /// `calls` times, simulating a window created some time after launch.
    pub fn show_main_window_after(&self, calls: usize, window: MemoryElement) {
        *self.scheduled.lock().unwrap_or_else(|e| e.into_inner()) = Some((calls, window));
    }

    pub fn main_window_calls(&self) -> usize {
        self.main_window_calls.load(Ordering::SeqCst)
    }

    pub fn close_requests(&self) -> usize {
        self.close_requests.load(Ordering::SeqCst)
    }

    pub fn exit(&self) {
        self.exited.store(true, Ordering::SeqCst);
    }
}

impl Application for MemoryApplication {
    type Element = MemoryElement;

    fn main_window(&self) -> Result<Option<MemoryElement>, AutomationError> {
        if self.exited.load(Ordering::SeqCst) {
            return Err(AutomationError::PlatformError(
                "Application has exited".to_string(),
            ));
        }

        let calls = self.main_window_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut scheduled = self.scheduled.lock().unwrap_or_else(|e| e.into_inner());
        if scheduled.as_ref().is_some_and(|(after, _)| calls >= *after) {
            if let Some((_, window)) = scheduled.take() {
                self.set_main_window(Some(window));
            }
        }

        Ok(read(&self.window).clone())
    }

    fn has_exited(&self) -> Result<bool, AutomationError> {
        Ok(self.exited.load(Ordering::SeqCst))
    }

    fn close(&self) -> Result<(), AutomationError> {
        self.close_requests.fetch_add(1, Ordering::SeqCst);
        if self.exit_on_close {
            if let Some(window) = write(&self.window).take() {
                window.remove();
            }
            self.exit();
        }
        Ok(())
    }
}
