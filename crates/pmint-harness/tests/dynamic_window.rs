#![forbid(unsafe_code)]

//! Windowed list binding: reconciliation, recycling and controller hooks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pmint_core::{ItemsSource, ObjectId, ObjectRef, ObservableList};
use pmint_harness::{ItemVm, RecordingFactory, items, list_of, object, register_fixtures};
use pmint_runtime::{
    Binder, ControllerArgs, DynamicBindingAccessor, DynamicController, Engine, EngineConfig,
    ListDynamicBinding, ScrollWindow, SyncStats,
};

struct Fixture {
    owner: Rc<ItemVm>,
    list: Rc<ObservableList>,
    window: Rc<RefCell<ScrollWindow>>,
    factory: Rc<RefCell<RecordingFactory>>,
    binding: Rc<ListDynamicBinding>,
}

fn fixture(len: usize, window_len: usize) -> Fixture {
    let engine = Engine::new(EngineConfig::default());
    register_fixtures(&engine);
    let list = list_of(&items("row", len));
    let owner = ItemVm::new("owner");
    owner.set_items(Some(Rc::clone(&list)));

    let window = Rc::new(RefCell::new(ScrollWindow::new(window_len)));
    let factory = RecordingFactory::new();
    let binding = ListDynamicBinding::new(&engine, "items", factory.clone(), window.clone());
    binding.bind(&object(&owner)).unwrap();
    Fixture {
        owner,
        list,
        window,
        factory,
        binding,
    }
}

impl Fixture {
    fn scroll_to(&self, offset: usize) -> SyncStats {
        self.window.borrow_mut().scroll_to(offset);
        self.binding.sync()
    }

    /// Ids of `list[offset..offset + len]`, clamped.
    fn window_ids(&self) -> Vec<ObjectId> {
        let window = self.window.borrow();
        let end = (window.offset() + window.len()).min(self.list.len());
        (window.offset()..end)
            .filter_map(|i| self.list.item(i))
            .map(|item| ObjectId::of(&*item))
            .collect()
    }
}

// ============================================================================
// Window materialization
// ============================================================================

#[test]
fn only_the_window_is_materialized() {
    let f = fixture(10_000, 20);
    assert_eq!(f.binding.materialized_count(), 20);
    assert_eq!(f.factory.borrow().created(), 20);
    assert_eq!(f.factory.borrow().order(), f.window_ids());
}

#[test]
fn scrolling_by_one_churns_one_view() {
    let f = fixture(10_000, 20);

    let stats = f.scroll_to(1);
    assert_eq!(
        stats,
        SyncStats {
            created: 1,
            released: 1
        }
    );
    assert_eq!(f.binding.materialized_count(), 20);
    assert_eq!(f.factory.borrow().order(), f.window_ids());

    // The released view was recycled for the entering item.
    assert_eq!(f.factory.borrow().reused(), 1);
}

#[test]
fn scrolling_far_replaces_the_window() {
    let f = fixture(10_000, 20);
    let stats = f.scroll_to(5_000);
    assert_eq!(
        stats,
        SyncStats {
            created: 20,
            released: 20
        }
    );
    assert_eq!(f.factory.borrow().order(), f.window_ids());
    assert_eq!(f.factory.borrow().live_count(), 20);
}

#[test]
fn resyncing_an_unchanged_window_is_free() {
    let f = fixture(100, 10);
    assert_eq!(f.binding.sync(), SyncStats::default());
}

#[test]
fn window_past_the_end_is_clamped() {
    let f = fixture(30, 20);
    // Rows 0..20 and 25..30 do not overlap.
    let stats = f.scroll_to(25);
    assert_eq!(
        stats,
        SyncStats {
            created: 5,
            released: 20
        }
    );
    assert_eq!(f.binding.materialized_count(), 5);
    assert_eq!(f.factory.borrow().order(), f.window_ids());
}

#[test]
fn controller_args_seed_the_window() {
    let engine = Engine::new(EngineConfig::default());
    register_fixtures(&engine);
    let rows = items("row", 50);
    let owner = ItemVm::new("owner");
    owner.set_items(Some(list_of(&rows)));
    let window = Rc::new(RefCell::new(ScrollWindow::new(0)));
    let factory = RecordingFactory::new();
    let binding = ListDynamicBinding::with_args(
        &engine,
        "items",
        factory.clone(),
        window.clone(),
        ControllerArgs::new().with("offset", 10).with("len", 5),
    );

    binding.bind(&object(&owner)).unwrap();
    assert_eq!(binding.materialized_count(), 5);
    assert!(binding.view_for(&object(&rows[10])).is_some());
    assert!(binding.view_for(&object(&rows[15])).is_none());
}

// ============================================================================
// Collection changes
// ============================================================================

#[test]
fn inserting_before_the_window_shifts_it() {
    let f = fixture(100, 10);
    f.list.insert(0, object(&ItemVm::new("head")));

    assert_eq!(f.binding.materialized_count(), 10);
    assert_eq!(f.factory.borrow().created(), 11);
    assert_eq!(f.factory.borrow().released(), 1);
    assert_eq!(f.factory.borrow().order(), f.window_ids());
}

#[test]
fn removing_inside_the_window_pulls_the_next_item_in() {
    let f = fixture(100, 10);
    let gone = f.list.remove_at(3).unwrap();

    assert!(f.binding.view_for(&gone).is_none());
    assert_eq!(f.binding.materialized_count(), 10);
    assert_eq!(f.factory.borrow().order(), f.window_ids());
}

#[test]
fn duplicate_items_in_window_share_a_view() {
    let f = fixture(10, 5);
    let first = f.list.item(0).unwrap();
    f.list.set(1, Rc::clone(&first));

    assert_eq!(f.binding.materialized_count(), 4);
    let order = f.factory.borrow().order();
    assert_eq!(order.first(), Some(&ObjectId::of(&*first)));
    assert_eq!(order.len(), 4);
}

#[test]
fn clearing_the_list_releases_every_view() {
    let f = fixture(100, 10);
    f.list.clear();
    assert_eq!(f.binding.materialized_count(), 0);
    assert_eq!(f.factory.borrow().live_count(), 0);
}

#[test]
fn swapping_the_collection_rematerializes() {
    let f = fixture(100, 10);
    let next = list_of(&items("next", 3));
    f.owner.set_items(Some(Rc::clone(&next)));

    assert_eq!(f.binding.materialized_count(), 3);
    assert_eq!(f.list.changed().handler_count(), 0);

    f.owner.set_items(None);
    assert_eq!(f.binding.materialized_count(), 0);
    assert!(f.binding.items_source().is_none());
}

#[test]
fn unbind_releases_views_and_detaches() {
    let f = fixture(100, 10);
    f.binding.unbind();
    assert_eq!(f.binding.materialized_count(), 0);
    assert_eq!(f.factory.borrow().live_count(), 0);
    assert_eq!(f.list.changed().handler_count(), 0);
    assert_eq!(f.owner.listener_count(), 0);

    // Scrolling an unbound binding does nothing.
    assert_eq!(f.scroll_to(5), SyncStats::default());
}

// ============================================================================
// Custom controllers
// ============================================================================

/// Shows every other item, newest first, and counts its hooks.
#[derive(Default)]
struct EvensReversed {
    inits: usize,
    updates: Rc<Cell<usize>>,
    seen: Rc<Cell<usize>>,
}

impl DynamicController for EvensReversed {
    fn init(&mut self, _accessor: &dyn DynamicBindingAccessor, _args: &ControllerArgs) {
        self.inits += 1;
    }

    fn get_dynamic_items(&mut self, list: &dyn ItemsSource) -> Vec<ObjectRef> {
        (0..list.len())
            .rev()
            .filter(|i| i % 2 == 0)
            .filter_map(|i| list.item(i))
            .collect()
    }

    fn update_view(&mut self, accessor: &dyn DynamicBindingAccessor) {
        self.updates.set(self.updates.get() + 1);
        self.seen.set(accessor.materialized_count());
    }
}

#[test]
fn custom_controller_drives_selection_and_order() {
    let engine = Engine::new(EngineConfig::default());
    register_fixtures(&engine);
    let rows = items("row", 6);
    let owner = ItemVm::new("owner");
    owner.set_items(Some(list_of(&rows)));
    let updates = Rc::new(Cell::new(0));
    let seen = Rc::new(Cell::new(0));
    let controller = Rc::new(RefCell::new(EvensReversed {
        updates: Rc::clone(&updates),
        seen: Rc::clone(&seen),
        ..EvensReversed::default()
    }));
    let factory = RecordingFactory::new();
    let binding = ListDynamicBinding::new(&engine, "items", factory.clone(), controller.clone());

    binding.bind(&object(&owner)).unwrap();
    assert_eq!(controller.borrow().inits, 1);
    assert_eq!(updates.get(), 1);
    assert_eq!(seen.get(), 3);
    assert_eq!(
        factory.borrow().order(),
        [4, 2, 0]
            .iter()
            .map(|&i| ObjectId::of(&*rows[i]))
            .collect::<Vec<_>>()
    );

    binding.sync();
    assert_eq!(updates.get(), 2);
}
