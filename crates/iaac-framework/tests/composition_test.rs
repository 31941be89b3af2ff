use iaac_framework::mock::{MockConfig, MockHandle, MockKind, MOCK_TYPE};
use iaac_framework::{iaac, join, uses, wrap, Builder, CompositionError, Stack, StackEnv};
use proptest::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

fn stack() -> Stack {
    Stack::new("test", StackEnv::default())
}

fn leaf(kind: &MockKind, name: &str) -> Builder<MockKind> {
    let label = name.to_lowercase();
    iaac(kind.clone()).define(name, move |_| Ok(MockConfig::labelled(label.clone())))
}

#[test]
fn test_join_twice_returns_same_handle() {
    let kind = MockKind::new();
    let storage = leaf(&kind, "Storage");
    let stack = stack();

    let first = join(&stack, &storage).unwrap();
    let second = join(&stack, &storage).unwrap();

    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(kind.constructions(), 1);
    assert_eq!(first.id(), "Storage");
}

#[test]
fn test_builder_clones_share_identity() {
    let kind = MockKind::new();
    let storage = leaf(&kind, "Storage");
    let alias = storage.clone();
    let stack = stack();

    let first = join(&stack, &storage).unwrap();
    let second = join(&stack, &alias).unwrap();

    assert!(storage.same_as(&alias));
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(kind.constructions(), 1);
}

#[test]
fn test_builders_are_lazy_until_joined() {
    let kind = MockKind::new();
    let evaluated = Rc::new(Cell::new(0));
    let counter = evaluated.clone();
    let _storage = iaac(kind.clone()).define("Storage", move |_| {
        counter.set(counter.get() + 1);
        Ok(MockConfig::labelled("table"))
    });

    assert_eq!(evaluated.get(), 0);
    assert_eq!(kind.attempts(), 0);
}

#[test]
fn test_identical_definitions_are_not_collapsed() {
    let kind = MockKind::new();
    let primary = leaf(&kind, "Primary");
    let replica = leaf(&kind, "Replica");
    let stack = stack();

    let primary = join(&stack, &primary).unwrap();
    let replica = join(&stack, &replica).unwrap();

    assert!(!Rc::ptr_eq(&primary, &replica));
    assert_eq!(primary.config(), &MockConfig::labelled("primary"));
    assert_eq!(kind.constructions(), 2);
}

#[test]
fn test_dependencies_resolve_before_definition() {
    let kind = MockKind::new();
    let storage = leaf(&kind, "Storage");
    let role = iaac(kind.clone())
        .after((storage.clone(),))
        .define("Role", |(storage,)| {
            Ok(MockConfig::labelled(format!("access {}", storage.id())))
        });
    let function = iaac(kind.clone())
        .after((role.clone(), storage.clone()))
        .define("Lambda", |(role, storage)| {
            Ok(MockConfig::labelled(format!("{} via {}", storage.id(), role.id())))
        });
    let stack = stack();

    let handle = join(&stack, &function).unwrap();

    assert_eq!(kind.constructed_ids(), vec!["Storage", "Role", "Lambda"]);
    assert_eq!(handle.config().label, "Storage via Role");
    assert_eq!(function.dependency_names(), vec!["Role", "Storage"]);
    assert_eq!(stack.scope().resource_ids(), vec!["Storage", "Role", "Lambda"]);
}

#[test]
fn test_wrap_does_not_reconstruct() {
    let kind = MockKind::new();
    let function = leaf(&kind, "Lambda");
    let integration =
        wrap(|function: &Rc<MockHandle>| format!("integration:{}", function.id()))(function.clone());
    let stack = stack();

    let direct = join(&stack, &function).unwrap();
    let view = join(&stack, &integration).unwrap();
    let again = join(&stack, &integration).unwrap();

    assert_eq!(kind.constructions(), 1);
    assert_eq!(view.as_str(), "integration:Lambda");
    assert!(Rc::ptr_eq(&view, &again));
    assert_eq!(direct.id(), "Lambda");
}

#[test]
fn test_wrap_keeps_handle_identity() {
    let kind = MockKind::new();
    let function = leaf(&kind, "Lambda");
    let first_view = wrap(|function: &Rc<MockHandle>| function.clone())(function.clone());
    let second_view = wrap(|function: &Rc<MockHandle>| function.id().len())(function.clone());
    let stack = stack();

    let wrapped = join(&stack, &first_view).unwrap();
    let length = join(&stack, &second_view).unwrap();
    let direct = join(&stack, &function).unwrap();

    assert!(Rc::ptr_eq(&*wrapped, &direct));
    assert_eq!(*length, 6);
    assert_eq!(kind.constructions(), 1);
}

#[test]
fn test_effect_observes_singleton_handles() {
    let kind = MockKind::new();
    let rest = leaf(&kind, "Gateway");
    let function = leaf(&kind, "Lambda");
    let seen: Rc<std::cell::RefCell<Vec<Rc<MockHandle>>>> = Rc::default();
    let sink = seen.clone();
    let routes = uses((rest.clone(), function.clone())).effect(move |(rest, function)| {
        rest.connect(function.id());
        sink.borrow_mut().push(rest.clone());
        sink.borrow_mut().push(function.clone());
        Ok(())
    });
    let stack = stack();

    let direct_rest = join(&stack, &rest).unwrap();
    join(&stack, &routes).unwrap();
    let direct_function = join(&stack, &function).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(Rc::ptr_eq(&seen[0], &direct_rest));
    assert!(Rc::ptr_eq(&seen[1], &direct_function));
    assert_eq!(kind.constructions(), 2);
}

#[test]
fn test_effect_runs_once() {
    let kind = MockKind::new();
    let rest = leaf(&kind, "Gateway");
    let runs = Rc::new(Cell::new(0));
    let counter = runs.clone();
    let routes = uses((rest.clone(),)).effect(move |(rest,)| {
        counter.set(counter.get() + 1);
        rest.connect("books");
        Ok(())
    });
    let stack = stack();

    join(&stack, &routes).unwrap();
    join(&stack, &routes).unwrap();
    join(&stack, &routes.clone()).unwrap();

    assert_eq!(runs.get(), 1);
    assert_eq!(join(&stack, &rest).unwrap().connections(), vec!["books"]);
    assert_eq!(routes.dependency_names(), ["Gateway".to_string()]);
}

#[test]
fn test_effect_constructs_unjoined_dependency_once() {
    let kind = MockKind::new();
    let queue = leaf(&kind, "Queue");
    let wiring = uses((queue.clone(), queue.clone())).effect(|(first, second)| {
        assert!(Rc::ptr_eq(first, second));
        Ok(())
    });
    let stack = stack();

    join(&stack, &wiring).unwrap();

    assert_eq!(kind.constructions(), 1);
}

#[test]
fn test_overlapping_effects_share_handles() {
    let kind = MockKind::new();
    let rest = leaf(&kind, "Gateway");
    let function = leaf(&kind, "Lambda");
    let reads = uses((rest.clone(), function.clone())).effect(|(rest, function)| {
        rest.connect(function.id());
        Ok(())
    });
    let writes = uses((function.clone(), rest.clone())).effect(|(function, rest)| {
        rest.connect(&format!("{}-write", function.id()));
        Ok(())
    });
    let stack = stack();

    join(&stack, &reads).unwrap();
    join(&stack, &writes).unwrap();

    let rest = join(&stack, &rest).unwrap();
    assert_eq!(rest.connections(), vec!["Lambda", "Lambda-write"]);
    assert_eq!(kind.constructions(), 2);
}

#[test]
fn test_definition_error_names_definition() {
    let kind = MockKind::new();
    let broken = iaac(kind.clone()).define("Broken", |_| Err("missing partition key".into()));
    let stack = stack();

    let err = join(&stack, &broken).unwrap_err();

    match err {
        CompositionError::Definition { name, source } => {
            assert_eq!(name, "Broken");
            assert_eq!(source.to_string(), "missing partition key");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(kind.attempts(), 0);
}

#[test]
fn test_construction_error_is_not_memoized() {
    let kind = MockKind::new();
    kind.expect_construct("Storage").return_err("invalid capacity");
    let storage = leaf(&kind, "Storage");
    let stack = stack();

    let err = join(&stack, &storage).unwrap_err();
    match &err {
        CompositionError::Construction { scope, name, .. } => {
            assert_eq!(scope, "test");
            assert_eq!(name, "Storage");
        }
        other => panic!("unexpected error: {other}"),
    }

    let handle = join(&stack, &storage).unwrap();
    assert_eq!(handle.id(), "Storage");
    assert_eq!(kind.attempts(), 2);
    assert_eq!(kind.constructions(), 1);
    kind.verify();
}

#[test]
fn test_corrected_definition_retries_cleanly() {
    let kind = MockKind::new();
    let stack = stack();
    let invalid = iaac(kind.clone()).define("Storage", |_| Ok(MockConfig::rejecting("read capacity 0")));
    assert!(join(&stack, &invalid).is_err());

    // The identifier was released, so a corrected declaration can take it.
    let corrected = leaf(&kind, "Storage");
    let handle = join(&stack, &corrected).unwrap();

    assert_eq!(handle.id(), "Storage");
    assert_eq!(stack.synth().unwrap().len(), 1);
}

#[test]
fn test_dependency_failure_propagates() {
    let kind = MockKind::new();
    kind.expect_construct("Storage").return_err("boom");
    let storage = leaf(&kind, "Storage");
    let role = iaac(kind.clone())
        .after((storage.clone(),))
        .define("Role", |_| Ok(MockConfig::labelled("role")));
    let stack = stack();

    let err = join(&stack, &role).unwrap_err();

    assert!(matches!(err, CompositionError::Construction { ref name, .. } if name == "Storage"));
    assert_eq!(kind.constructions(), 0);
}

#[test]
fn test_identifier_collision_is_detected() {
    let kind = MockKind::new();
    let first = leaf(&kind, "Storage");
    let second = leaf(&kind, "Storage");
    let stack = stack();

    join(&stack, &first).unwrap();
    let err = join(&stack, &second).unwrap_err();

    match err {
        CompositionError::IdentifierCollision { id, existing, requested } => {
            assert_eq!(id, "Storage");
            assert_eq!(existing, "test/Storage");
            assert_eq!(requested, "test/Storage");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(kind.constructions(), 1);
}

#[test]
fn test_collision_across_nested_scopes() {
    let kind = MockKind::new();
    let stack = stack();
    let api = stack.scope().nested("Api").unwrap();

    join(&api, &leaf(&kind, "Storage")).unwrap();
    let err = join(&stack, &leaf(&kind, "ApiStorage")).unwrap_err();

    assert!(matches!(err, CompositionError::IdentifierCollision { ref id, .. } if id == "ApiStorage"));
}

#[test]
fn test_unusable_name_is_rejected() {
    let kind = MockKind::new();
    let stack = stack();

    let err = join(&stack, &leaf(&kind, "{+}")).unwrap_err();

    assert!(matches!(err, CompositionError::InvalidIdentifier { .. }));
    assert_eq!(kind.attempts(), 0);
}

#[test]
fn test_same_builder_in_two_scopes_constructs_twice() {
    let kind = MockKind::new();
    let storage = leaf(&kind, "Storage");
    let stack = stack();
    let blue = stack.scope().nested("Blue").unwrap();
    let green = stack.scope().nested("Green").unwrap();

    let in_blue = join(&blue, &storage).unwrap();
    let in_green = join(&green, &storage).unwrap();

    assert!(!Rc::ptr_eq(&in_blue, &in_green));
    assert_eq!(kind.constructed_ids(), vec!["BlueStorage", "GreenStorage"]);
    assert_eq!(in_blue.scope(), "test/Blue");
    assert!(Rc::ptr_eq(&in_blue, &join(&blue, &storage).unwrap()));
}

#[test]
fn test_nested_scope_names_are_unique() {
    let stack = stack();
    let api = stack.scope().nested("Api").unwrap();

    assert_eq!(api.path(), "test/Api");
    assert_eq!(api.name(), "Api");
    assert!(matches!(
        stack.scope().nested("Api"),
        Err(CompositionError::IdentifierCollision { .. })
    ));
    assert_eq!(stack.scope().children().len(), 1);
    assert!(stack.scope().children()[0].same_as(&api));
}

#[test]
fn test_failed_effect_taints_synthesis() {
    let kind = MockKind::new();
    let rest = leaf(&kind, "Gateway");
    let routes = uses((rest.clone(),)).effect(|(rest,)| {
        rest.connect("books");
        Err("conflicting method".into())
    });
    let stack = stack();

    let err = join(&stack, &routes).unwrap_err();

    assert!(matches!(err, CompositionError::Effect { ref names, .. } if names == &["Gateway".to_string()]));
    assert!(stack.scope().is_tainted());
    assert!(matches!(stack.synth(), Err(CompositionError::Tainted { .. })));
}

#[test]
fn test_failed_effect_is_not_reapplied() {
    let kind = MockKind::new();
    let rest = leaf(&kind, "Gateway");
    let runs = Rc::new(Cell::new(0));
    let counter = runs.clone();
    let routes = uses((rest.clone(),)).effect(move |(rest,)| {
        counter.set(counter.get() + 1);
        rest.connect("books");
        Err("conflicting method".into())
    });
    let stack = stack();

    assert!(matches!(join(&stack, &routes), Err(CompositionError::Effect { .. })));
    let err = join(&stack, &routes).unwrap_err();

    assert!(matches!(err, CompositionError::Tainted { ref stack } if stack == "test"));
    assert_eq!(runs.get(), 1);
    let rest = join(&stack, &rest).unwrap();
    assert_eq!(rest.connections(), vec!["books".to_string()]);
}

#[test]
fn test_synthesis_is_deterministic() {
    fn compose() -> String {
        let kind = MockKind::new();
        let storage = leaf(&kind, "Storage");
        let function = iaac(kind.clone())
            .after((storage.clone(),))
            .define("Lambda", |(storage,)| Ok(MockConfig::labelled(storage.id())));
        let wiring = uses((storage.clone(), function.clone())).effect(|(storage, function)| {
            storage.connect(function.id());
            Ok(())
        });
        let stack = stack();
        let nested = stack.scope().nested("Audit").unwrap();
        join(&stack, &wiring).unwrap();
        join(&nested, &storage).unwrap();
        stack.synth().unwrap().to_json_pretty().unwrap()
    }

    let first = compose();
    let second = compose();

    assert_eq!(first, second);
    assert!(first.contains("\"AuditStorage\""));
}

#[test]
fn test_synth_twice_on_same_stack() {
    let kind = MockKind::new();
    let stack = stack();
    join(&stack, &leaf(&kind, "Storage")).unwrap();

    let first = stack.synth().unwrap();
    let second = stack.synth().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.ids_of_type(MOCK_TYPE), vec!["Storage"]);
}

#[test]
fn test_synth_to_writes_template() {
    let kind = MockKind::new();
    let stack = stack();
    join(&stack, &leaf(&kind, "Storage")).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let path = stack.synth_to(dir.path()).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();

    assert!(path.ends_with("test.template.json"));
    assert_eq!(written, format!("{}\n", stack.synth().unwrap().to_json_pretty().unwrap()));
}

#[test]
fn test_probe_evaluates_without_constructing() {
    let kind = MockKind::new();
    let storage = leaf(&kind, "Storage");
    let role = iaac(kind.clone())
        .after((storage.clone(),))
        .define("Role", |(storage,)| Ok(MockConfig::labelled(storage.id())));
    let stack = stack();

    let config = role.probe(stack.scope()).unwrap();

    assert_eq!(config.label, "Storage");
    assert_eq!(kind.constructed_ids(), vec!["Storage"]);
}

proptest! {
    /// Any join order over any subset of builders constructs each joined
    /// builder exactly once.
    #[test]
    fn prop_each_builder_constructed_once(order in proptest::collection::vec(0usize..5, 0..40)) {
        let kind = MockKind::new();
        let builders: Vec<_> = (0..5).map(|i| leaf(&kind, &format!("Resource{i}"))).collect();
        let stack = stack();
        let mut handles: Vec<Option<Rc<MockHandle>>> = vec![None; builders.len()];

        for index in &order {
            let handle = join(&stack, &builders[*index]).unwrap();
            if let Some(previous) = &handles[*index] {
                prop_assert!(Rc::ptr_eq(previous, &handle));
            }
            handles[*index] = Some(handle);
        }

        let distinct = handles.iter().filter(|handle| handle.is_some()).count();
        prop_assert_eq!(kind.constructions(), distinct);
        prop_assert_eq!(kind.attempts(), distinct);
    }
}
