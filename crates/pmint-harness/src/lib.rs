#![forbid(unsafe_code)]

//! Test harness and reference fixtures for Peppermint data binding.
//!
//! # Fixtures
//!
//! | Fixture | Role |
//! |---------|------|
//! | [`ItemVm`] | Observable view model: `name`, `count`, `child`, `items` |
//! | [`QuietVm`] | View model without change events (driven via the manager) |
//! | [`Label`] | Binding target with a write counter |
//! | [`Swatch`] | Target holding a custom [`Color`] value |
//! | [`TestView`] | Host view owning a data context and a label |
//! | [`RecordingFactory`] | Pooling view factory that records every call |
//!
//! Call [`register_fixtures`] on an engine before binding any of them.
//! [`capture_logs`] records the warnings and errors a closure emits.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use pmint_core::{
    Bindable, ObjectId, ObjectRef, ObservableList, PropertyChangedEvent, TypeInfo, Value,
    ValueType,
};
use pmint_runtime::{
    BindingSpec, DataContext, Engine, PropertyBinding, View, ViewFactory, ViewHandle,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Register every fixture type with `engine`.
pub fn register_fixtures(engine: &Engine) {
    engine.register_type(ItemVm::type_info());
    engine.register_type(QuietVm::type_info());
    engine.register_type(Label::type_info());
    engine.register_type(Swatch::type_info());
}

fn build(info: Result<TypeInfo, pmint_core::AccessError>, name: &str) -> TypeInfo {
    match info {
        Ok(info) => info,
        Err(err) => panic!("fixture type {name} is malformed: {err}"),
    }
}

// ============================================================================
// Log capture
// ============================================================================

/// A warning or error emitted while [`capture_logs`] ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLog {
    pub level: Level,
    pub message: String,
}

#[derive(Clone, Default)]
struct CaptureLayer {
    logs: Arc<Mutex<Vec<CapturedLog>>>,
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level != Level::WARN && level != Level::ERROR {
            return;
        }
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        if let Ok(mut logs) = self.logs.lock() {
            logs.push(CapturedLog { level, message });
        }
    }
}

/// Run `f` with a thread-local subscriber and return the warnings and
/// errors it logged.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<CapturedLog>) {
    let layer = CaptureLayer::default();
    let logs = Arc::clone(&layer.logs);
    let subscriber = tracing_subscriber::registry().with(layer);
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = logs.lock().map(|l| l.clone()).unwrap_or_default();
    (result, logs)
}

// ============================================================================
// View models
// ============================================================================

/// Observable view model used throughout the tests.
#[derive(Default)]
pub struct ItemVm {
    name: RefCell<String>,
    count: RefCell<i64>,
    child: RefCell<Option<Rc<ItemVm>>>,
    items: RefCell<Option<Rc<ObservableList>>>,
    changed: PropertyChangedEvent,
}

impl Bindable for ItemVm {
    fn property_changed(&self) -> Option<&PropertyChangedEvent> {
        Some(&self.changed)
    }
}

impl ItemVm {
    #[must_use]
    pub fn new(name: &str) -> Rc<Self> {
        let vm = Self::default();
        *vm.name.borrow_mut() = name.to_owned();
        Rc::new(vm)
    }

    #[must_use]
    pub fn type_info() -> TypeInfo {
        build(
            TypeInfo::builder::<ItemVm>("ItemVm")
                .property_rw(
                    "name",
                    ValueType::String,
                    |vm| Value::from(vm.name()),
                    |vm, v| {
                        vm.set_name(&String::try_from(v)?);
                        Ok(())
                    },
                )
                .property_rw(
                    "count",
                    ValueType::Int,
                    |vm| Value::Int(vm.count()),
                    |vm, v| {
                        vm.set_count(v.try_into()?);
                        Ok(())
                    },
                )
                .property("child", ValueType::Object, |vm| {
                    vm.child
                        .borrow()
                        .as_ref()
                        .map_or(Value::Null, Value::object)
                })
                .property("items", ValueType::Collection, |vm| {
                    vm.items
                        .borrow()
                        .as_ref()
                        .map_or(Value::Null, Value::collection)
                })
                .build(),
            "ItemVm",
        )
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) -> bool {
        self.changed
            .set_property(ObjectId::of(self), &self.name, name.to_owned(), "name")
    }

    #[must_use]
    pub fn count(&self) -> i64 {
        *self.count.borrow()
    }

    pub fn set_count(&self, count: i64) -> bool {
        self.changed
            .set_property(ObjectId::of(self), &self.count, count, "count")
    }

    #[must_use]
    pub fn child(&self) -> Option<Rc<ItemVm>> {
        self.child.borrow().clone()
    }

    pub fn set_child(&self, child: Option<Rc<ItemVm>>) {
        let unchanged = match (&*self.child.borrow(), &child) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        };
        if unchanged {
            return;
        }
        *self.child.borrow_mut() = child;
        self.changed.raise(ObjectId::of(self), Some("child"));
    }

    #[must_use]
    pub fn items(&self) -> Option<Rc<ObservableList>> {
        self.items.borrow().clone()
    }

    pub fn set_items(&self, items: Option<Rc<ObservableList>>) {
        let unchanged = match (&*self.items.borrow(), &items) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        };
        if unchanged {
            return;
        }
        *self.items.borrow_mut() = items;
        self.changed.raise(ObjectId::of(self), Some("items"));
    }

    /// Raise a change for every property without modifying anything.
    pub fn notify_all(&self) {
        self.changed.notify_all(ObjectId::of(self));
    }

    /// Number of handlers currently listening to this view model.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.changed.handler_count()
    }
}

impl fmt::Debug for ItemVm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemVm")
            .field("name", &self.name())
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

/// View model that never raises change events.
#[derive(Debug, Default)]
pub struct QuietVm {
    name: RefCell<String>,
}

impl Bindable for QuietVm {}

impl QuietVm {
    #[must_use]
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Self {
            name: RefCell::new(name.to_owned()),
        })
    }

    #[must_use]
    pub fn type_info() -> TypeInfo {
        build(
            TypeInfo::builder::<QuietVm>("QuietVm")
                .property("name", ValueType::String, |vm| Value::from(vm.name()))
                .build(),
            "QuietVm",
        )
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /// Change the name without notifying anyone.
    pub fn set_name(&self, name: &str) {
        *self.name.borrow_mut() = name.to_owned();
    }
}

// ============================================================================
// Targets
// ============================================================================

/// Text target that counts setter calls.
#[derive(Default)]
pub struct Label {
    text: RefCell<String>,
    writes: Cell<usize>,
    changed: PropertyChangedEvent,
}

impl Bindable for Label {
    fn property_changed(&self) -> Option<&PropertyChangedEvent> {
        Some(&self.changed)
    }
}

impl Label {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn type_info() -> TypeInfo {
        build(
            TypeInfo::builder::<Label>("Label")
                .property_rw(
                    "text",
                    ValueType::String,
                    |l| Value::from(l.text()),
                    |l, v| {
                        l.set_text(&String::try_from(v)?);
                        Ok(())
                    },
                )
                .build(),
            "Label",
        )
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }

    pub fn set_text(&self, text: &str) -> bool {
        self.writes.set(self.writes.get() + 1);
        self.changed
            .set_property(ObjectId::of(self), &self.text, text.to_owned(), "text")
    }

    /// Number of times the setter ran, changed or not.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Label").field("text", &self.text()).finish()
    }
}

/// RGB color stored as a custom value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb`.
    #[must_use]
    pub fn parse_hex(input: &str) -> Option<Self> {
        let hex = input.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Target with a [`Color`] property.
#[derive(Debug, Default)]
pub struct Swatch {
    color: Cell<Color>,
}

impl Bindable for Swatch {}

impl Swatch {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn type_info() -> TypeInfo {
        build(
            TypeInfo::builder::<Swatch>("Swatch")
                .property_rw(
                    "color",
                    ValueType::custom::<Color>(),
                    |s| Value::custom(s.color()),
                    |s, v| {
                        s.color
                            .set(v.as_custom::<Color>().copied().unwrap_or_default());
                        Ok(())
                    },
                )
                .build(),
            "Swatch",
        )
    }

    #[must_use]
    pub fn color(&self) -> Color {
        self.color.get()
    }
}

// ============================================================================
// Views
// ============================================================================

/// Host view: a data context, a label and the last sibling index applied.
pub struct TestView {
    context: Rc<DataContext>,
    label: Rc<Label>,
    sibling: Cell<Option<usize>>,
}

impl TestView {
    /// A view whose label is bound to the item's `name` when `engine` is given.
    #[must_use]
    pub fn new(engine: Option<&Rc<Engine>>) -> Rc<Self> {
        let context = Rc::new(DataContext::new());
        let label = Label::new();
        if let Some(engine) = engine {
            match PropertyBinding::new(engine, label.clone(), BindingSpec::new("name", "text")) {
                Ok(binding) => context.add_binder(binding),
                Err(err) => tracing::error!(%err, "test view label binding failed"),
            }
        }
        Rc::new(Self {
            context,
            label,
            sibling: Cell::new(None),
        })
    }

    #[must_use]
    pub fn context(&self) -> &Rc<DataContext> {
        &self.context
    }

    #[must_use]
    pub fn label(&self) -> &Rc<Label> {
        &self.label
    }

    #[must_use]
    pub fn sibling_index(&self) -> Option<usize> {
        self.sibling.get()
    }

    /// Identity of the item the view currently shows.
    #[must_use]
    pub fn item_id(&self) -> Option<ObjectId> {
        self.context.source().map(|s| ObjectId::of(&*s))
    }
}

impl View for TestView {
    fn data_context(&self) -> Option<Rc<DataContext>> {
        Some(Rc::clone(&self.context))
    }

    fn set_sibling_index(&self, index: usize) {
        self.sibling.set(Some(index));
    }
}

impl fmt::Debug for TestView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestView")
            .field("item", &self.item_id())
            .field("sibling", &self.sibling_index())
            .field("binders", &self.context.binder_count())
            .finish()
    }
}

/// Pooling factory that records creates, releases and reuse.
#[derive(Default)]
pub struct RecordingFactory {
    engine: Option<Rc<Engine>>,
    live: Vec<Rc<TestView>>,
    pool: Vec<Rc<TestView>>,
    created: usize,
    released: usize,
    reused: usize,
    updates: usize,
}

impl RecordingFactory {
    /// Factory producing views without bindings.
    #[must_use]
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    /// Factory producing views whose label shows the item's `name`.
    #[must_use]
    pub fn with_label_bindings(engine: &Rc<Engine>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            engine: Some(Rc::clone(engine)),
            ..Self::default()
        }))
    }

    /// Views handed out, including reused ones.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created
    }

    #[must_use]
    pub fn released(&self) -> usize {
        self.released
    }

    /// Creates served from the pool.
    #[must_use]
    pub fn reused(&self) -> usize {
        self.reused
    }

    /// Calls to `update_view`.
    #[must_use]
    pub fn updates(&self) -> usize {
        self.updates
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn live_views(&self) -> &[Rc<TestView>] {
        &self.live
    }

    /// The live view showing `item`.
    #[must_use]
    pub fn view_for(&self, item: &ObjectRef) -> Option<Rc<TestView>> {
        let id = ObjectId::of(&**item);
        self.live.iter().find(|v| v.item_id() == Some(id)).cloned()
    }

    /// Items of the live views in display order.
    ///
    /// Views that never received a sibling index were appended by the host
    /// and sort after the indexed ones, oldest first.
    #[must_use]
    pub fn order(&self) -> Vec<ObjectId> {
        let mut views: Vec<_> = self
            .live
            .iter()
            .filter_map(|v| Some((v.sibling_index().unwrap_or(usize::MAX), v.item_id()?)))
            .collect();
        views.sort_by_key(|(index, _)| *index);
        views.into_iter().map(|(_, id)| id).collect()
    }
}

impl ViewFactory for RecordingFactory {
    fn create_item_view(&mut self, _item: &ObjectRef) -> Option<ViewHandle> {
        let view = match self.pool.pop() {
            Some(view) => {
                self.reused += 1;
                view
            }
            None => TestView::new(self.engine.as_ref()),
        };
        self.created += 1;
        self.live.push(Rc::clone(&view));
        Some(view)
    }

    fn release_item_view(&mut self, view: ViewHandle) {
        self.released += 1;
        let position = self
            .live
            .iter()
            .position(|v| std::ptr::addr_eq(Rc::as_ptr(v), Rc::as_ptr(&view)));
        if let Some(position) = position {
            let view = self.live.remove(position);
            view.sibling.set(None);
            self.pool.push(view);
        }
    }

    fn update_view(&mut self) {
        self.updates += 1;
    }
}

/// Wrap a view model as a binding source.
#[must_use]
pub fn object<T: Bindable>(obj: &Rc<T>) -> ObjectRef {
    Rc::clone(obj) as ObjectRef
}

/// `n` view models named `prefix0`, `prefix1`, ...
#[must_use]
pub fn items(prefix: &str, n: usize) -> Vec<Rc<ItemVm>> {
    (0..n).map(|i| ItemVm::new(&format!("{prefix}{i}"))).collect()
}

/// A list holding `items`.
#[must_use]
pub fn list_of(items: &[Rc<ItemVm>]) -> Rc<ObservableList> {
    Rc::new(ObservableList::from_items(
        items.iter().map(object).collect(),
    ))
}
