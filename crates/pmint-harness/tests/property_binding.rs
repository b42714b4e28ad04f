#![forbid(unsafe_code)]

//! Property binding behavior across modes, converters and lifecycles.

use std::rc::Rc;

use pmint_core::{ConvertError, FnConverter, Value, ValueType};
use pmint_harness::{Color, ItemVm, Label, Swatch, capture_logs, object, register_fixtures};
use pmint_runtime::{
    Binder, BindingError, BindingFlags, BindingMode, BindingSpec, Engine, EngineConfig,
    PropertyBinding,
};

fn engine() -> Rc<Engine> {
    let engine = Engine::new(EngineConfig::default());
    register_fixtures(&engine);
    engine
}

fn bind(
    engine: &Rc<Engine>,
    source: &Rc<ItemVm>,
    label: &Rc<Label>,
    spec: BindingSpec,
) -> Rc<PropertyBinding> {
    let binding = PropertyBinding::new(engine, object(label), spec).unwrap();
    binding.bind(&object(source)).unwrap();
    binding
}

// ============================================================================
// One-way
// ============================================================================

#[test]
fn one_way_follows_source_changes() {
    let engine = engine();
    let vm = ItemVm::new("alpha");
    let label = Label::new();
    let _binding = bind(&engine, &vm, &label, BindingSpec::new("name", "text"));

    assert_eq!(label.text(), "alpha");
    vm.set_name("beta");
    assert_eq!(label.text(), "beta");
}

#[test]
fn unchanged_source_value_does_not_rewrite_target() {
    let engine = engine();
    let vm = ItemVm::new("alpha");
    let label = Label::new();
    let _binding = bind(&engine, &vm, &label, BindingSpec::new("name", "text"));
    let writes = label.writes();

    vm.notify_all();
    vm.notify_all();

    assert_eq!(label.writes(), writes);
    assert_eq!(label.text(), "alpha");
}

#[test]
fn one_way_ignores_target_edits() {
    let engine = engine();
    let vm = ItemVm::new("alpha");
    let label = Label::new();
    let _binding = bind(&engine, &vm, &label, BindingSpec::new("name", "text"));

    label.set_text("edited");
    assert_eq!(vm.name(), "alpha");
}

#[test]
fn int_source_is_coerced_to_string_target() {
    let engine = engine();
    let vm = ItemVm::new("alpha");
    vm.set_count(42);
    let label = Label::new();
    let binding = bind(&engine, &vm, &label, BindingSpec::new("count", "text"));

    assert!(binding.converter().is_some());
    assert_eq!(label.text(), "42");
    vm.set_count(-3);
    assert_eq!(label.text(), "-3");
}

// ============================================================================
// Two-way
// ============================================================================

#[test]
fn two_way_echo_settles_after_each_change() {
    let engine = engine();
    let vm = ItemVm::new("start");
    let label = Label::new();
    let _binding = bind(
        &engine,
        &vm,
        &label,
        BindingSpec::new("name", "text").with_mode(BindingMode::TwoWay),
    );
    assert_eq!(label.writes(), 1);

    const ROUNDS: usize = 50;
    for i in 0..ROUNDS {
        if i % 2 == 0 {
            vm.set_name(&format!("source {i}"));
            assert_eq!(label.text(), format!("source {i}"));
        } else {
            label.set_text(&format!("target {i}"));
            assert_eq!(vm.name(), format!("target {i}"));
        }
    }

    // One setter call per change, whichever side made it.
    assert_eq!(label.writes(), 1 + ROUNDS);
}

#[test]
fn two_way_converts_back_through_default_converter() {
    let engine = engine();
    let vm = ItemVm::new("n");
    vm.set_count(5);
    let label = Label::new();
    let _binding = bind(
        &engine,
        &vm,
        &label,
        BindingSpec::new("count", "text").with_mode(BindingMode::TwoWay),
    );

    assert_eq!(label.text(), "5");
    label.set_text("12");
    assert_eq!(vm.count(), 12);

    // Unparseable text is dropped with a warning.
    let (_, logs) = capture_logs(|| label.set_text("twelve"));
    assert_eq!(vm.count(), 12);
    assert!(logs.iter().any(|l| l.message.contains("failed to update binding source")));
}

#[test]
fn one_way_to_source_pushes_target_on_bind() {
    let engine = engine();
    let vm = ItemVm::new("old");
    let label = Label::new();
    label.set_text("from target");
    let _binding = bind(
        &engine,
        &vm,
        &label,
        BindingSpec::new("name", "text").with_mode(BindingMode::OneWayToSource),
    );

    assert_eq!(vm.name(), "from target");
    label.set_text("again");
    assert_eq!(vm.name(), "again");

    vm.set_name("ignored by target");
    assert_eq!(label.text(), "again");
}

// ============================================================================
// Converters
// ============================================================================

#[test]
fn exact_pair_converter_beats_default_coercion() {
    let engine = engine();
    engine
        .add_converter(
            ValueType::Int,
            ValueType::String,
            Rc::new(FnConverter::new(|v| Ok(Value::from(format!("#{v}"))))),
        )
        .unwrap();

    let vm = ItemVm::new("n");
    vm.set_count(7);
    let label = Label::new();
    let _binding = bind(&engine, &vm, &label, BindingSpec::new("count", "text"));

    assert_eq!(label.text(), "#7");
}

#[test]
fn string_to_custom_color_uses_registered_converter() {
    let engine = engine();
    let vm = ItemVm::new("#10ff80");
    let swatch = Swatch::new();
    let spec = BindingSpec::new("name", "color");

    // No coercion exists for string -> Color until one is registered: the
    // binding still binds, and every write is dropped with a warning.
    let binding = PropertyBinding::new(&engine, object(&swatch), spec).unwrap();
    let (result, logs) = capture_logs(|| binding.bind(&object(&vm)));
    assert!(result.is_ok());
    assert!(binding.is_bound());
    assert!(binding.converter().is_none());
    assert_eq!(swatch.color(), Color::default());
    assert!(logs.iter().any(|log| log.message.contains("no value converter")));
    assert!(logs.iter().any(|log| log.message == "failed to update binding target"));

    let ((), logs) = capture_logs(|| {
        vm.set_name("#202020");
    });
    assert_eq!(swatch.color(), Color::default());
    assert_eq!(logs.len(), 1);

    engine
        .add_converter(
            ValueType::String,
            ValueType::custom::<Color>(),
            Rc::new(FnConverter::new(|v| {
                let text = v.as_str().unwrap_or_default();
                Color::parse_hex(text).map(Value::custom).ok_or_else(|| {
                    ConvertError::Parse {
                        input: text.to_owned(),
                        to: ValueType::custom::<Color>(),
                    }
                })
            })),
        )
        .unwrap();

    // The matched converter is picked up on the next bind.
    binding.unbind();
    binding.bind(&object(&vm)).unwrap();
    assert!(binding.converter().is_some());
    assert_eq!(swatch.color(), Color::rgb(0x20, 0x20, 0x20));
    vm.set_name("#000001");
    assert_eq!(swatch.color(), Color::rgb(0, 0, 1));
}

#[test]
fn named_converter_is_resolved_at_creation() {
    let engine = engine();
    let label = Label::new();

    let missing = PropertyBinding::new(
        &engine,
        object(&label),
        BindingSpec::new("name", "text").with_converter_name("shout"),
    );
    assert_eq!(
        missing.err(),
        Some(BindingError::UnknownConverter("shout".into()))
    );

    engine
        .add_named_converter(
            "shout",
            Rc::new(FnConverter::new(|v| Ok(Value::from(v.to_string().to_uppercase())))),
        )
        .unwrap();
    let vm = ItemVm::new("quiet");
    let _binding = bind(
        &engine,
        &vm,
        &label,
        BindingSpec::new("name", "text").with_converter_name("shout"),
    );
    assert_eq!(label.text(), "QUIET");
}

#[test]
fn disabling_auto_match_passes_values_through() {
    let engine = engine();
    let vm = ItemVm::new("n");
    vm.set_count(3);
    let label = Label::new();
    let binding = bind(
        &engine,
        &vm,
        &label,
        BindingSpec::new("count", "text").with_flags(BindingFlags::empty()),
    );

    // Int cannot be written to a string property; the update is dropped.
    assert!(binding.converter().is_none());
    assert_eq!(label.text(), "");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn unbind_with_reset_target_restores_default() {
    let engine = engine();
    let vm = ItemVm::new("shown");
    let label = Label::new();
    let binding = bind(
        &engine,
        &vm,
        &label,
        BindingSpec::new("name", "text")
            .with_flags(BindingFlags::AUTO_MATCH_CONVERTER | BindingFlags::RESET_TARGET_VALUE),
    );
    assert_eq!(label.text(), "shown");

    binding.unbind();
    assert_eq!(label.text(), "");
    assert_eq!(vm.name(), "shown");
}

#[test]
fn unbind_without_reset_leaves_values() {
    let engine = engine();
    let vm = ItemVm::new("shown");
    let label = Label::new();
    let binding = bind(&engine, &vm, &label, BindingSpec::new("name", "text"));

    binding.unbind();
    assert_eq!(label.text(), "shown");

    vm.set_name("after");
    assert_eq!(label.text(), "shown");
    assert_eq!(vm.listener_count(), 0);
}

#[test]
fn unbind_with_reset_source_restores_source_default() {
    let engine = engine();
    let vm = ItemVm::new("n");
    vm.set_count(9);
    let label = Label::new();
    let binding = bind(
        &engine,
        &vm,
        &label,
        BindingSpec::new("count", "text").with_flags(
            BindingFlags::AUTO_MATCH_CONVERTER | BindingFlags::RESET_SOURCE_VALUE,
        ),
    );

    binding.unbind();
    assert_eq!(vm.count(), 0);
}

#[test]
fn rebinding_requires_unbind_first() {
    let engine = engine();
    let first = ItemVm::new("first");
    let second = ItemVm::new("second");
    let label = Label::new();
    let binding = bind(&engine, &first, &label, BindingSpec::new("name", "text"));

    assert_eq!(
        binding.bind(&object(&second)),
        Err(BindingError::AlreadyBound)
    );
    binding.unbind();
    binding.bind(&object(&second)).unwrap();
    assert_eq!(label.text(), "second");
    assert_eq!(first.listener_count(), 0);
}

#[test]
fn dropping_binding_silences_it() {
    let engine = engine();
    let vm = ItemVm::new("a");
    let label = Label::new();
    let binding = bind(&engine, &vm, &label, BindingSpec::new("name", "text"));
    drop(binding);

    vm.set_name("b");
    assert_eq!(label.text(), "a");
    assert_eq!(vm.listener_count(), 0);
}

// ============================================================================
// Paths
// ============================================================================

#[test]
fn nested_path_binds_to_leaf_owner() {
    let engine = engine();
    let parent = ItemVm::new("parent");
    let child = ItemVm::new("child");
    parent.set_child(Some(Rc::clone(&child)));
    let label = Label::new();
    let binding = bind(&engine, &parent, &label, BindingSpec::new("child.name", "text"));

    assert_eq!(label.text(), "child");
    child.set_name("renamed");
    assert_eq!(label.text(), "renamed");
    assert!(pmint_core::same_object(
        &binding.source().unwrap(),
        &object(&child)
    ));
}

#[test]
fn null_intermediate_fails_to_bind() {
    let engine = engine();
    let parent = ItemVm::new("parent");
    let label = Label::new();
    let binding =
        PropertyBinding::new(&engine, object(&label), BindingSpec::new("child.name", "text"))
            .unwrap();

    let (result, logs) = capture_logs(|| binding.bind(&object(&parent)));
    assert!(matches!(
        result,
        Err(BindingError::NullNestedSource { .. })
    ));
    assert!(!logs.is_empty());
}

#[test]
fn malformed_paths_are_rejected() {
    let engine = engine();
    let vm = ItemVm::new("a");
    let label = Label::new();
    for path in ["", ".name", "child..name", "name."] {
        let binding =
            PropertyBinding::new(&engine, object(&label), BindingSpec::new(path, "text"))
                .unwrap();
        assert!(
            matches!(binding.bind(&object(&vm)), Err(BindingError::InvalidPath(_))),
            "path {path:?} should be rejected"
        );
    }
}

#[test]
fn read_only_target_rejects_target_updating_modes() {
    let engine = engine();
    let target = ItemVm::new("target");

    let result = PropertyBinding::new(&engine, object(&target), BindingSpec::new("name", "child"));
    assert!(matches!(
        result,
        Err(BindingError::Access(pmint_core::AccessError::ReadOnly { .. }))
    ));
}
