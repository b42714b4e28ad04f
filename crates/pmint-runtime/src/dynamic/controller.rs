#![forbid(unsafe_code)]

//! Controllers decide which items of a list are materialized.

use ahash::AHashMap;

use pmint_core::{ItemsRef, ItemsSource, ObjectRef, Value};

use crate::view::ViewHandle;

/// Read-only view of a dynamic binding, handed to its controller.
pub trait DynamicBindingAccessor {
    /// The collection being windowed.
    fn items_source(&self) -> Option<ItemsRef>;

    /// The view materialized for `item`, if any.
    fn item_view(&self, item: &ObjectRef) -> Option<ViewHandle>;

    /// Number of materialized views.
    fn materialized_count(&self) -> usize;
}

/// Named arguments passed to [`DynamicController::init`].
#[derive(Debug, Clone, Default)]
pub struct ControllerArgs {
    values: AHashMap<String, Value>,
}

impl ControllerArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Integer argument, if present and non-negative.
    #[must_use]
    pub fn get_usize(&self, name: &str) -> Option<usize> {
        self.get(name)
            .and_then(Value::as_int)
            .and_then(|v| usize::try_from(v).ok())
    }
}

/// Strategy that selects the visible subset of a list.
pub trait DynamicController {
    /// Called once per bind, before the first sync.
    fn init(&mut self, accessor: &dyn DynamicBindingAccessor, args: &ControllerArgs);

    /// The items that should have views, in display order.
    fn get_dynamic_items(&mut self, list: &dyn ItemsSource) -> Vec<ObjectRef>;

    /// Called after every sync, once views and order are final.
    fn update_view(&mut self, accessor: &dyn DynamicBindingAccessor) {
        let _ = accessor;
    }
}

/// Contiguous window `[offset, offset + len)` over the list.
///
/// The host scrolls by calling [`ScrollWindow::scroll_to`] and then asking
/// the binding to sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollWindow {
    offset: usize,
    len: usize,
}

impl ScrollWindow {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { offset: 0, len }
    }

    pub fn scroll_to(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub fn resize(&mut self, len: usize) {
        self.len = len;
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl DynamicController for ScrollWindow {
    /// Reads the optional `offset` and `len` arguments.
    fn init(&mut self, _accessor: &dyn DynamicBindingAccessor, args: &ControllerArgs) {
        if let Some(offset) = args.get_usize("offset") {
            self.offset = offset;
        }
        if let Some(len) = args.get_usize("len") {
            self.len = len;
        }
    }

    fn get_dynamic_items(&mut self, list: &dyn ItemsSource) -> Vec<ObjectRef> {
        let end = self.offset.saturating_add(self.len).min(list.len());
        (self.offset..end).filter_map(|i| list.item(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use pmint_core::Bindable;

    struct Row;
    impl Bindable for Row {}

    struct NoBinding;
    impl DynamicBindingAccessor for NoBinding {
        fn items_source(&self) -> Option<ItemsRef> {
            None
        }
        fn item_view(&self, _: &ObjectRef) -> Option<ViewHandle> {
            None
        }
        fn materialized_count(&self) -> usize {
            0
        }
    }

    fn rows(n: usize) -> Vec<ObjectRef> {
        (0..n).map(|_| Rc::new(Row) as ObjectRef).collect()
    }

    #[test]
    fn window_clamps_to_list() {
        let list = rows(5);
        let mut window = ScrollWindow::new(3);
        assert_eq!(window.get_dynamic_items(&list).len(), 3);
        window.scroll_to(4);
        assert_eq!(window.get_dynamic_items(&list).len(), 1);
        window.scroll_to(9);
        assert!(window.get_dynamic_items(&list).is_empty());
    }

    #[test]
    fn init_reads_args() {
        let mut window = ScrollWindow::new(10);
        let args = ControllerArgs::new().with("offset", 2).with("len", 4);
        window.init(&NoBinding, &args);
        assert_eq!(window, ScrollWindow { offset: 2, len: 4 });

        window.init(&NoBinding, &ControllerArgs::new().with("len", -1));
        assert_eq!(window.len(), 4);
    }
}
