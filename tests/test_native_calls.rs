use callbridge::runtime::{ExecutionContext, FrameRecord, Mark, ReferenceService};
use callbridge::stub::{set_dynamic_tracing, Op};
use callbridge::{
    Boundary, BoundaryConfig, Handle, InvokeError, Lightweight, Linkage, ManagedException, NativeEnv, NativeMethod,
    NativeValue, TraceMode, Value, VmThread,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

const MANAGED_FRAME: FrameRecord = FrameRecord { sp: 0x7fff_1000, fp: 0x7fff_1040, pc: 0x40_2000 };

fn managed_thread(boundary: &Boundary, name: &str) -> VmThread {
    let mut thread = boundary.attach_thread(name);
    thread.enter_managed_frame(MANAGED_FRAME);
    thread
}

fn method(holder: &str, name: &str, descriptor: &str, is_static: bool) -> NativeMethod {
    NativeMethod::parse(holder, name, descriptor, is_static).unwrap()
}

fn lightweight() -> Linkage {
    // SAFETY: the natives below only do arithmetic
    Linkage::Lightweight(unsafe { Lightweight::assume_gc_safe() })
}

#[test]
fn test_scenario_a_instance_int_to_int() {
    let boundary = Boundary::default();
    let m = method("demo/Counter", "add", "(I)I", false);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let recorded = Arc::clone(&seen);
    boundary.register_native(&m, move |env: &mut NativeEnv<'_>, args: &[NativeValue]| {
        recorded.lock().extend_from_slice(args);
        assert_eq!(env.handle_stack_top(), Mark(1));
        NativeValue::Int(args[2].as_int().unwrap_or(0) * 2)
    });

    let stub = boundary.stub(&m, Linkage::Standard).unwrap();
    assert_eq!(stub.handle_count(), 1);
    assert!(!stub.ops().contains(&Op::Unhand));

    let mut thread = managed_thread(&boundary, "main");
    let receiver = boundary.space().allocate("demo/Counter");
    let result = boundary
        .invoke(&stub, &mut thread, &[Value::object(receiver), Value::Int(21)])
        .unwrap();

    assert_eq!(result, Value::Int(42));
    let args = seen.lock().clone();
    assert_eq!(args.len(), 3);
    assert_eq!(args[0], NativeValue::Env(thread.env_ptr()));
    assert!(args[1].as_handle().is_some_and(|h| !h.is_null()));
    assert_eq!(args[2], NativeValue::Int(21));
    assert_eq!(thread.handles().depth(), 0);
}

#[test]
fn test_scenario_b_static_object_result() {
    let boundary = Boundary::default();
    let m = method("demo/Factory", "make", "()Ljava/lang/Object;", true);
    let created = boundary.space().allocate("demo/Widget");
    let mirror = boundary.class_mirror("demo/Factory");

    boundary.register_native(&m, move |env: &mut NativeEnv<'_>, args: &[NativeValue]| {
        // the class handle is the only handle the stub created
        assert_eq!(env.handle_stack_top(), Mark(1));
        let class = args[1].as_handle().unwrap_or(Handle::NULL);
        assert_eq!(env.unhand(class).unwrap(), Some(mirror));

        let a = env.new_handle(Some(created)).unwrap();
        env.new_handle(Some(created)).unwrap();
        assert_eq!(env.handle_stack_top(), Mark(3));
        NativeValue::Handle(a)
    });

    let stub = boundary.stub(&m, Linkage::Standard).unwrap();
    let mut thread = managed_thread(&boundary, "main");
    let result = boundary.invoke(&stub, &mut thread, &[]).unwrap();

    assert_eq!(result, Value::object(created));
    // the class handle and both result handles are gone
    assert_eq!(thread.handles().depth(), 0);
}

#[test]
fn test_scenario_c_lightweight_two_slot_values() {
    let boundary = Boundary::default();
    let m = method("demo/Clock", "record", "(JD)V", true);
    let seen = Arc::new(Mutex::new(None));

    let recorded = Arc::clone(&seen);
    boundary.register_native(&m, move |env: &mut NativeEnv<'_>, args: &[NativeValue]| {
        *recorded.lock() = Some((args.to_vec(), env.frame_record()));
        NativeValue::Void
    });

    let stub = boundary.stub(&m, lightweight()).unwrap();
    let mut thread = managed_thread(&boundary, "main");
    let result = boundary
        .invoke(&stub, &mut thread, &[Value::Long(i64::MAX), Value::Double(2.5)])
        .unwrap();

    assert_eq!(result, Value::Void);
    let (args, frame) = seen.lock().clone().unwrap();
    assert_eq!(args, vec![NativeValue::Long(i64::MAX), NativeValue::Double(2.5)]);
    // no transition: the walker still sees the managed frame
    assert_eq!(frame, MANAGED_FRAME);
    assert_eq!(thread.frame_record_writes(), 0);
    assert_eq!(thread.handles().depth(), 0);
}

#[test]
fn test_frame_marker_set_once_and_cleared_once() {
    let boundary = Boundary::default();
    let m = method("demo/Probe", "inspect", "(I)I", true);
    let observed = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&observed);
    boundary.register_native(&m, move |env: &mut NativeEnv<'_>, _: &[NativeValue]| {
        log.lock().push(env.frame_record());
        NativeValue::Int(0)
    });

    let stub = boundary.stub(&m, Linkage::Standard).unwrap();
    let mut thread = managed_thread(&boundary, "main");
    boundary.invoke(&stub, &mut thread, &[Value::Int(1)]).unwrap();

    let inside = observed.lock().clone();
    assert_eq!(inside, vec![MANAGED_FRAME.in_native()]);
    assert!(inside[0].is_in_native());
    assert_eq!(thread.frame_record_writes(), 2);
    assert_eq!(thread.current_frame_record(), MANAGED_FRAME);
    assert!(!thread.current_frame_record().is_in_native());
}

#[test]
fn test_pending_exception_observed_only_after_return() {
    let boundary = Boundary::default();
    let m = method("demo/Io", "read", "(Ljava/lang/Object;)I", true);
    boundary.register_native(&m, |env: &mut NativeEnv<'_>, _: &[NativeValue]| {
        assert!(!env.exception_check());
        env.throw(ManagedException::new("java.io.IOException", "closed"));
        assert!(env.exception_check());
        NativeValue::Int(-1)
    });

    let stub = boundary.stub(&m, Linkage::Standard).unwrap();
    let mut thread = managed_thread(&boundary, "main");
    let buffer = boundary.space().allocate("java/nio/ByteBuffer");
    assert!(!thread.has_pending_exception());

    let err = boundary.invoke(&stub, &mut thread, &[Value::object(buffer)]).unwrap_err();
    match err {
        InvokeError::PendingException(exc) => {
            assert_eq!(exc.to_string(), "java.io.IOException: closed");
        }
        other => panic!("unexpected {:?}", other),
    }
    // rethrown exactly once and cleared
    assert!(!thread.has_pending_exception());
    assert_eq!(thread.handles().depth(), 0);
    assert_eq!(thread.current_frame_record(), MANAGED_FRAME);

    // the next call is unaffected
    let m2 = method("demo/Io", "ok", "()I", true);
    boundary.register_native(&m2, |_: &mut NativeEnv<'_>, _: &[NativeValue]| NativeValue::Int(0));
    let ok = boundary.stub(&m2, Linkage::Standard).unwrap();
    assert_eq!(boundary.invoke(&ok, &mut thread, &[]), Ok(Value::Int(0)));
}

#[test]
fn test_reference_result_survives_relocation() {
    let boundary = Boundary::default();
    let m = method("demo/Cache", "pin", "(Ljava/lang/Object;)Ljava/lang/Object;", true);
    let space = Arc::clone(boundary.space());
    let moved_to = Arc::new(Mutex::new(None));

    let record = Arc::clone(&moved_to);
    boundary.register_native(&m, move |env: &mut NativeEnv<'_>, args: &[NativeValue]| {
        let handle = args[2].as_handle().unwrap_or(Handle::NULL);
        let before = env.unhand(handle).unwrap().unwrap();
        // a moving collection runs while native code holds the handle
        let after = space.relocate(before).unwrap();
        assert_eq!(env.relocate(before, after), 1);
        assert_eq!(env.unhand(handle).unwrap(), Some(after));
        *record.lock() = Some(after);
        NativeValue::Handle(handle)
    });

    let stub = boundary.stub(&m, Linkage::Standard).unwrap();
    let mut thread = managed_thread(&boundary, "gc");
    let object = boundary.space().allocate("demo/Entry");
    let result = boundary.invoke(&stub, &mut thread, &[Value::object(object)]).unwrap();

    let after = moved_to.lock().unwrap();
    assert_ne!(after, object);
    assert_eq!(result, Value::object(after));
}

#[test]
fn test_null_references_cross_as_null_handles() {
    let boundary = Boundary::default();
    let m = method("demo/Maybe", "echo", "(Ljava/lang/String;)Ljava/lang/String;", false);
    boundary.register_native(&m, |_: &mut NativeEnv<'_>, args: &[NativeValue]| {
        assert_eq!(args[2], NativeValue::Handle(Handle::NULL));
        args[2]
    });

    let stub = boundary.stub(&m, Linkage::Standard).unwrap();
    let mut thread = managed_thread(&boundary, "main");
    let receiver = boundary.space().allocate("demo/Maybe");
    // null passes the String cast
    let result = boundary.invoke(&stub, &mut thread, &[Value::object(receiver), Value::null()]);
    assert_eq!(result, Ok(Value::null()));
}

#[test]
fn test_check_cast_accepts_subclass() {
    let boundary = Boundary::default();
    boundary.space().define_class("demo/Circle", "demo/Shape");
    let circle = boundary.space().allocate("demo/Circle");

    let m = method("demo/Shapes", "any", "()Ldemo/Shape;", true);
    boundary.register_native(&m, move |env: &mut NativeEnv<'_>, _: &[NativeValue]| {
        NativeValue::Handle(env.new_handle(Some(circle)).unwrap())
    });

    let stub = boundary.stub(&m, Linkage::Standard).unwrap();
    let mut thread = managed_thread(&boundary, "main");
    assert_eq!(boundary.invoke(&stub, &mut thread, &[]), Ok(Value::object(circle)));
}

#[test]
fn test_nested_native_calls_restore_marks() {
    let boundary = Arc::new(Boundary::default());
    let inner = method("demo/Tree", "leaf", "(Ljava/lang/Object;)I", true);
    let outer = method("demo/Tree", "node", "(Ljava/lang/Object;)I", true);

    boundary.register_native(&inner, |env: &mut NativeEnv<'_>, _: &[NativeValue]| {
        NativeValue::Int(env.handle_stack_top().0 as i32)
    });

    let inner_stub = boundary.stub(&inner, Linkage::Standard).unwrap();
    boundary.register_native(&outer, move |env: &mut NativeEnv<'_>, args: &[NativeValue]| {
        let depth_before = env.handle_stack_top();
        let child = env.unhand(args[2].as_handle().unwrap_or(Handle::NULL)).unwrap();
        let nested = env.invoke(&inner_stub, &[Value::Reference(child)]).unwrap();
        // nested call freed exactly what it created
        assert_eq!(env.handle_stack_top(), depth_before);
        match nested {
            Value::Int(depth) => NativeValue::Int(depth + 100),
            _ => NativeValue::Int(-1),
        }
    });

    let stub = boundary.stub(&outer, Linkage::Standard).unwrap();
    let mut thread = managed_thread(&boundary, "main");
    let object = boundary.space().allocate("java/lang/Object");
    let result = boundary.invoke(&stub, &mut thread, &[Value::object(object)]).unwrap();

    // outer: class + arg = 2 handles; inner adds class + arg = 4
    assert_eq!(result, Value::Int(104));
    assert_eq!(thread.handles().depth(), 0);
    assert_eq!(thread.current_frame_record(), MANAGED_FRAME);
}

#[test]
fn test_local_frame_frees_handles_early() {
    let boundary = Boundary::default();
    let m = method("demo/Loop", "spin", "()I", true);
    let object = boundary.space().allocate("java/lang/Object");

    boundary.register_native(&m, move |env: &mut NativeEnv<'_>, _: &[NativeValue]| {
        let base = env.handle_stack_top();
        for _ in 0..100 {
            env.with_local_frame(|local| {
                local.new_handle(Some(object)).unwrap();
                local.new_handle(Some(object)).unwrap();
            });
        }
        NativeValue::Int((env.handle_stack_top().0 - base.0) as i32)
    });

    let stub = boundary.stub(&m, Linkage::Standard).unwrap();
    let mut thread = managed_thread(&boundary, "main");
    assert_eq!(boundary.invoke(&stub, &mut thread, &[]), Ok(Value::Int(0)));
}

#[test]
fn test_handle_depth_is_bounded_across_many_calls() {
    let boundary = Boundary::default();
    let m = method("demo/Sink", "take", "(Ljava/lang/Object;Ljava/lang/Object;)V", false);
    boundary.register_native(&m, |_: &mut NativeEnv<'_>, _: &[NativeValue]| NativeValue::Void);

    let stub = boundary.stub(&m, Linkage::Standard).unwrap();
    let mut thread = managed_thread(&boundary, "main");
    let object = boundary.space().allocate("demo/Sink");
    let args = [Value::object(object), Value::object(object), Value::null()];

    for _ in 0..10_000 {
        boundary.invoke(&stub, &mut thread, &args).unwrap();
    }
    assert_eq!(thread.handles().depth(), 0);
    assert!(thread.handles().limit() >= 3);
}

#[test]
fn test_tracing_does_not_change_call_state() {
    let config = BoundaryConfig {
        stubs: callbridge::config::StubConfig { trace: TraceMode::Dynamic },
        ..BoundaryConfig::default()
    };
    let boundary = Boundary::new(config);
    let m = method("demo/Trace", "f", "(Ljava/lang/Object;)Ljava/lang/Object;", true);
    boundary.register_native(&m, |_: &mut NativeEnv<'_>, args: &[NativeValue]| args[2]);

    let stub = boundary.stub(&m, Linkage::Standard).unwrap();
    assert!(stub.ops().iter().any(Op::is_trace));
    let object = boundary.space().allocate("java/lang/Object");

    let mut outcomes = Vec::new();
    for enabled in [false, true] {
        set_dynamic_tracing(enabled);
        let mut thread = managed_thread(&boundary, "traced");
        let result = boundary.invoke(&stub, &mut thread, &[Value::object(object)]);
        outcomes.push((result, thread.handles().depth(), thread.frame_record_writes(), thread.current_frame_record()));
    }
    set_dynamic_tracing(false);

    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(outcomes[0].0, Ok(Value::object(object)));
}

#[test]
fn test_threads_share_linkage_and_stubs() {
    let boundary = Arc::new(Boundary::default());
    let m = method("demo/Counter", "bump", "(Ljava/lang/Object;I)I", true);
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    boundary.register_native(&m, move |_: &mut NativeEnv<'_>, args: &[NativeValue]| {
        counter.fetch_add(1, Ordering::Relaxed);
        NativeValue::Int(args[3].as_int().unwrap_or(0) + 1)
    });

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let boundary = Arc::clone(&boundary);
            let m = m.clone();
            thread::spawn(move || {
                let stub = boundary.stub(&m, Linkage::Standard).unwrap();
                let mut thread = managed_thread(&boundary, &format!("worker-{}", i));
                let object = boundary.space().allocate("java/lang/Object");
                for n in 0..100 {
                    let result = boundary
                        .invoke(&stub, &mut thread, &[Value::object(object), Value::Int(n)])
                        .unwrap();
                    assert_eq!(result, Value::Int(n + 1));
                }
                thread.handles().depth()
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap(), 0);
    }
    assert_eq!(calls.load(Ordering::Relaxed), 800);
    assert_eq!(boundary.linkage().len(), 1);
    assert_eq!(boundary.linkage().lookups(), 1);
}

#[test]
fn test_lightweight_rejects_unsafe_shapes() {
    let boundary = Boundary::default();
    let err = boundary
        .stub(&method("demo/A", "f", "(Ljava/lang/String;)I", true), lightweight())
        .unwrap_err();
    assert_eq!(err, callbridge::PreconditionError::ReferenceInLightweight { index: 0 });
}

#[test]
fn test_managed_thread_services_through_trait_object() {
    let boundary = Boundary::default();
    let mut thread = managed_thread(&boundary, "dyn");
    let object = boundary.space().allocate("java/lang/Object");
    let ctx: &mut dyn callbridge::ThreadContext = &mut thread;
    let handle = ctx.make_handle(Some(object)).unwrap();
    assert_eq!(ctx.unhand(handle).unwrap(), Some(object));
    ctx.reset_handle_stack(Mark(0));
    assert_eq!(ctx.handle_stack_top(), Mark(0));
}
