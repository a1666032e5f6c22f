//! End-to-end bridge scenarios: configuration reading, callback dispatch,
//! and reference stability across unrelated traffic

use scripting::vm::{Engine, TypeTag, Value};
use scripting::{access, extract, invoke, navigator, refs, ErrorFlags, Sel, Source};

/// Populate the engine the way a configuration script would: nested tables,
/// scalars of every kind, arrays, and a couple of callables.
fn load_scene_config(engine: &mut Engine) {
    let scene = navigator::open_new(engine);
    access::set(engine, &scene, Sel::Key("title"), "harbor");
    access::set(engine, &scene, Sel::Key("iterations"), 250i64);
    access::set(engine, &scene, Sel::Key("tolerance"), 1e-6f64);
    access::set(engine, &scene, Sel::Key("verbose"), false);
    access::set_array(engine, &scene, Sel::Key("bounds"), &[-1.0f64, 1.0]);

    let camera = navigator::open_new(engine);
    access::set(engine, &camera, Sel::Key("fov"), 65.0f64);
    access::set(engine, &camera, Sel::Key("near"), 0.1f64);
    access::set_from_top(engine, &scene, Sel::Key("camera"));
    drop(camera);

    engine.push_slot(scene.slot());
    access::set_global_from_top(engine, "scene");
    navigator::close(engine, scene).expect("close scene");

    engine.register_global_fn("add", |_, args| {
        let mut total = 0.0;
        for arg in &args {
            match arg {
                Value::Int(i) => total += *i as f64,
                Value::Num(n) => total += n,
                other => return Err(format!("cannot add a {} value", other.type_name())),
            }
        }
        Ok(vec![Value::Num(total)])
    });
    engine.register_global_fn("fail", |_, _| Err("scripted failure".to_string()));
}

#[test]
fn test_configuration_read_with_defaults() {
    let mut engine = Engine::new();
    load_scene_config(&mut engine);

    let scene = navigator::open_global(&mut engine, "scene").expect("scene global");

    let (title, flags) = access::get::<String>(&mut engine, Source::Entry(&scene, Sel::Key("title")), None);
    assert_eq!(title, "harbor");
    assert!(flags.is_clean());

    let (iterations, flags) =
        access::get::<i32>(&mut engine, Source::Entry(&scene, Sel::Key("iterations")), None);
    assert_eq!(iterations, 250);
    assert!(flags.is_clean());

    // entry the script never set: defaulted, classified, usable
    let (threads, flags) =
        access::get::<i64>(&mut engine, Source::Entry(&scene, Sel::Key("threads")), Some(1));
    assert_eq!(threads, 1);
    assert_eq!(flags, ErrorFlags::NON_EXISTENT);
    assert!(!flags.is_fatal());

    // nested table through a scoped open
    let fov = navigator::with_entry(&mut engine, &scene, Sel::Key("camera"), |engine, camera| {
        let (fov, flags) = access::get::<f64>(engine, Source::Entry(camera, Sel::Key("fov")), None);
        assert!(flags.is_clean());
        fov
    });
    assert_eq!(fov, Some(65.0));

    let (bounds, flags) =
        access::get_array::<f64>(&mut engine, Source::Entry(&scene, Sel::Key("bounds")), None);
    assert_eq!(bounds, vec![-1.0, 1.0]);
    assert!(flags.is_clean());

    navigator::close(&mut engine, scene).expect("close scene");
    assert_eq!(engine.top(), 0);
}

#[test]
fn test_iteration_visits_each_entry_exactly_once() {
    let mut engine = Engine::new();
    let table = navigator::open_new(&mut engine);
    access::set(&mut engine, &table, Sel::Key("a"), 1i64);
    access::set(&mut engine, &table, Sel::Key("b"), 2i64);
    access::set(&mut engine, &table, Sel::Key("c"), 3i64);

    let mut seen = Vec::new();
    let mut more = navigator::first(&mut engine, &table);
    while more {
        // stack holds table, key, value; take the value, keep the key
        let (value, flags) = extract::extract::<i64>(&mut engine, None);
        assert!(flags.is_clean());
        let (key, flags) = access::get::<String>(&mut engine, Source::Top, None);
        assert!(flags.is_clean());
        engine.push_str(&key); // the enumeration key goes back for advance
        seen.push((key, value));
        more = navigator::advance(&mut engine, &table);
    }

    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("a".to_string(), 1),
            ("b".to_string(), 2),
            ("c".to_string(), 3),
        ],
        "three pairs, no duplicates, regardless of enumeration order"
    );
    assert_eq!(engine.top(), 1, "exhaustion leaves just the table");
    navigator::close(&mut engine, table).expect("close table");
}

#[test]
fn test_reference_survives_unrelated_traffic() {
    let mut engine = Engine::new();
    load_scene_config(&mut engine);

    // resolve once, take a reference
    let scene = navigator::open_global(&mut engine, "scene").expect("scene global");
    let (camera_ref, flags) = refs::create(&mut engine, Source::Entry(&scene, Sel::Key("camera")));
    assert!(flags.is_clean());
    let camera_ref = camera_ref.expect("camera is a table");
    navigator::close(&mut engine, scene).expect("close scene");

    // plenty of unrelated table and function operations in between
    for round in 0..10 {
        let scene = navigator::open_global(&mut engine, "scene").expect("scene global");
        access::set(&mut engine, &scene, Sel::Key("round"), round as i64);
        access::set_array(&mut engine, &scene, Sel::Key("noise"), &[round as i64; 3]);
        navigator::close(&mut engine, scene).expect("close scene");

        let tag = navigator::push_global(&mut engine, "add");
        assert_eq!(tag, TypeTag::Func);
        let mut call = invoke::open_from_top(&mut engine).expect("add is callable");
        invoke::push_arg(&mut engine, &mut call, round as i64);
        let (flags, _) = invoke::invoke(&mut engine, &mut call, 1);
        assert!(flags.is_clean());
        extract::extract::<f64>(&mut engine, None);
        invoke::close(&mut engine, call).expect("close call");
    }

    // the reference still resolves to an indistinguishable table
    assert_eq!(refs::push(&mut engine, &camera_ref), TypeTag::Table);
    let camera = navigator::open_top(&mut engine).expect("referenced table");
    let (fov, flags) = access::get::<f64>(&mut engine, Source::Entry(&camera, Sel::Key("fov")), None);
    assert_eq!(fov, 65.0);
    assert!(flags.is_clean());
    let (near, flags) = access::get::<f64>(&mut engine, Source::Entry(&camera, Sel::Key("near")), None);
    assert_eq!(near, 0.1);
    assert!(flags.is_clean());
    assert_eq!(navigator::length(&mut engine, &camera), 2);
    navigator::close(&mut engine, camera).expect("close referenced table");

    refs::release(&mut engine, camera_ref);
    assert_eq!(engine.top(), 0);
    assert_eq!(engine.registry_len(), 0, "release frees the registry entry");
}

#[test]
fn test_callback_dispatch_and_failure_recovery() {
    let mut engine = Engine::new();
    load_scene_config(&mut engine);
    let depth_before = engine.top();

    // the canonical two-argument addition scenario
    let tag = navigator::push_global(&mut engine, "add");
    assert_eq!(tag, TypeTag::Func);
    let mut call = invoke::open_from_top(&mut engine).expect("add is callable");
    invoke::push_arg(&mut engine, &mut call, 10.5f64);
    invoke::push_arg(&mut engine, &mut call, 20.2f64);
    let (flags, message) = invoke::invoke(&mut engine, &mut call, 1);
    assert!(flags.is_clean(), "unexpected failure: {message:?}");
    let (sum, flags) = extract::extract::<f64>(&mut engine, None);
    assert!(flags.is_clean());
    assert!((sum - 30.7).abs() < 1e-9);
    invoke::close(&mut engine, call).expect("close add");
    assert_eq!(engine.top(), depth_before);

    // a scripted failure comes back classified, with the script's message
    let tag = navigator::push_global(&mut engine, "fail");
    assert_eq!(tag, TypeTag::Func);
    let mut call = invoke::open_from_top(&mut engine).expect("fail is callable");
    let (flags, message) = invoke::invoke(&mut engine, &mut call, 1);
    assert!(flags.is_fatal());
    assert_eq!(message.as_deref(), Some("scripted failure"));
    invoke::close(&mut engine, call).expect("close fail");
    assert_eq!(engine.top(), depth_before, "failure paths stay balanced too");
}

#[test]
fn test_set_and_get_every_scalar_kind() {
    let mut engine = Engine::new();
    let table = navigator::open_new(&mut engine);

    access::set(&mut engine, &table, Sel::Key("flag"), true);
    access::set(&mut engine, &table, Sel::Key("narrow"), 7i32);
    access::set(&mut engine, &table, Sel::Key("wide"), 1i64 << 40);
    access::set(&mut engine, &table, Sel::Key("single"), 0.25f32);
    access::set(&mut engine, &table, Sel::Key("double"), 2.5f64);
    access::set(&mut engine, &table, Sel::Key("text"), "payload");
    access::set(&mut engine, &table, Sel::Key("ptr"), scripting::LightPtr(0x1000));
    access::set(&mut engine, &table, Sel::Index(1), 11i64);

    assert_eq!(
        access::get::<bool>(&mut engine, Source::Entry(&table, Sel::Key("flag")), None),
        (true, ErrorFlags::empty())
    );
    assert_eq!(
        access::get::<i32>(&mut engine, Source::Entry(&table, Sel::Key("narrow")), None),
        (7, ErrorFlags::empty())
    );
    assert_eq!(
        access::get::<i64>(&mut engine, Source::Entry(&table, Sel::Key("wide")), None),
        (1i64 << 40, ErrorFlags::empty())
    );
    assert_eq!(
        access::get::<f32>(&mut engine, Source::Entry(&table, Sel::Key("single")), None),
        (0.25, ErrorFlags::empty())
    );
    assert_eq!(
        access::get::<f64>(&mut engine, Source::Entry(&table, Sel::Key("double")), None),
        (2.5, ErrorFlags::empty())
    );
    assert_eq!(
        access::get::<String>(&mut engine, Source::Entry(&table, Sel::Key("text")), None),
        ("payload".to_string(), ErrorFlags::empty())
    );
    assert_eq!(
        access::get::<scripting::LightPtr>(&mut engine, Source::Entry(&table, Sel::Key("ptr")), None),
        (scripting::LightPtr(0x1000), ErrorFlags::empty())
    );
    assert_eq!(
        access::get::<i64>(&mut engine, Source::Entry(&table, Sel::Index(1)), None),
        (11, ErrorFlags::empty())
    );

    assert_eq!(engine.top(), 1, "every accessor pair was net zero");
    navigator::close(&mut engine, table).expect("close table");
}
