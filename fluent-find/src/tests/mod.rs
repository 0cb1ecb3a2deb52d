mod find_builder_tests;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{
    AutomationError, Condition, ControlType, Element, MemoryElement, PropertyId, PropertyValue,
    TreeScope,
};

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_test_writer()
        .try_init();
}

/// Notepad-like window used across the suite:
///
/// ```text
/// Window "Untitled - Notepad"
/// ├── Document #15
/// ├── MenuBar "Application"
/// │   ├── MenuItem "File"
/// │   └── MenuItem "Edit"
/// └── Pane "Dialog"
///     ├── Text "Save changes?"
///     ├── Button "Save"
///     └── Button "Cancel"
/// ```
pub struct Notepad {
    pub window: MemoryElement,
    pub document: MemoryElement,
    pub menu_bar: MemoryElement,
    pub file_item: MemoryElement,
    pub dialog: MemoryElement,
    pub prompt: MemoryElement,
    pub save: MemoryElement,
}

impl Notepad {
    pub fn new() -> Self {
        let window = MemoryElement::new(ControlType::Window)
            .with_name("Untitled - Notepad")
            .with_process_id(4242);
        let document = window
            .append(
                MemoryElement::new(ControlType::Document)
                    .with_automation_id("15")
                    .with_class_name("Edit"),
            )
            .unwrap();
        let menu_bar = window.append(MemoryElement::new(ControlType::MenuBar).with_name("Application")).unwrap();
        let file_item = menu_bar.append(MemoryElement::new(ControlType::MenuItem).with_name("File")).unwrap();
        menu_bar.append(MemoryElement::new(ControlType::MenuItem).with_name("Edit")).unwrap();
        let dialog = window.append(MemoryElement::new(ControlType::Pane).with_name("Dialog")).unwrap();
        let prompt = dialog.append(MemoryElement::new(ControlType::Text).with_name("Save changes?")).unwrap();
        let save = dialog
            .append(
                MemoryElement::new(ControlType::Button)
                    .with_name("Save")
                    .with_help_text("Save the document"),
            )
            .unwrap();
        dialog.append(MemoryElement::new(ControlType::Button).with_name("Cancel")).unwrap();

        Self {
            window,
            document,
            menu_bar,
            file_item,
            dialog,
            prompt,
            save,
        }
    }
}

/// Wraps a [`MemoryElement`] and counts provider calls made through it and
/// every element reached from it.
#[derive(Clone, Debug)]
pub struct CountingElement {
    pub inner: MemoryElement,
    pub counters: Arc<Counters>,
}

#[derive(Debug, Default)]
pub struct Counters {
    pub find_first: AtomicUsize,
    pub find_all: AtomicUsize,
    pub nested: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl CountingElement {
    pub fn new(inner: MemoryElement) -> Self {
        Self {
            inner,
            counters: Arc::new(Counters::default()),
        }
    }

    fn wrap(&self, inner: MemoryElement) -> Self {
        Self {
            inner,
            counters: self.counters.clone(),
        }
    }
}

impl Element for CountingElement {
    fn property(&self, id: PropertyId) -> Result<Option<PropertyValue>, AutomationError> {
        self.inner.property(id)
    }

    fn children(&self) -> Result<Vec<Self>, AutomationError> {
        Ok(self
            .inner
            .children()?
            .into_iter()
            .map(|c| self.wrap(c))
            .collect())
    }

    fn parent(&self) -> Result<Option<Self>, AutomationError> {
        Ok(self.inner.parent()?.map(|p| self.wrap(p)))
    }

    fn find_first(
        &self,
        scope: TreeScope,
        condition: &Condition,
    ) -> Result<Option<Self>, AutomationError> {
        self.counters.find_first.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.find_first(scope, condition)?.map(|e| self.wrap(e)))
    }

    fn find_all(&self, scope: TreeScope, condition: &Condition) -> Result<Vec<Self>, AutomationError> {
        self.counters.find_all.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .inner
            .find_all(scope, condition)?
            .into_iter()
            .map(|e| self.wrap(e))
            .collect())
    }

    fn find_first_nested(&self, conditions: &[Condition]) -> Result<Option<Self>, AutomationError> {
        self.counters.nested.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.find_first_nested(conditions)?.map(|e| self.wrap(e)))
    }
}
