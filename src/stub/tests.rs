//! Tests for stub synthesis and execution

use super::*;
use crate::convention::Abi;
use crate::error::{InvokeError, LinkError, PreconditionError};
use crate::linker::LinkageCache;
use crate::runtime::{
    ExecutionContext, FrameRecord, ManagedException, NativeValue, ObjectSpace, ReferenceService, Value, VmThread,
};
use crate::signature::{NativeMethod, ParameterKind};
use std::sync::Arc;

fn method(holder: &str, name: &str, descriptor: &str, is_static: bool) -> NativeMethod {
    NativeMethod::parse(holder, name, descriptor, is_static).unwrap()
}

fn lightweight() -> Linkage {
    // SAFETY: test natives neither block nor allocate
    Linkage::Lightweight(unsafe { Lightweight::assume_gc_safe() })
}

fn mnemonics(stub: &Stub) -> Vec<&'static str> {
    stub.ops().iter().map(Op::mnemonic).collect()
}

fn position(stub: &Stub, mnemonic: &str) -> usize {
    stub.ops()
        .iter()
        .position(|op| op.mnemonic() == mnemonic)
        .unwrap_or_else(|| panic!("no {} in\n{}", mnemonic, stub))
}

fn thread() -> VmThread {
    let mut thread = VmThread::new("main", Arc::new(ObjectSpace::new()));
    thread.enter_managed_frame(FrameRecord::new(0x7fff_0000, 0x7fff_0040, 0x40_1000));
    thread
}

// ----------------------------------------------------------------------------
// Synthesis
// ----------------------------------------------------------------------------

#[test]
fn test_standard_instance_stub_sequence() {
    let stub = synthesize(&method("demo/Counter", "add", "(I)I", false), Linkage::Standard).unwrap();
    assert_eq!(
        mnemonics(&stub),
        vec![
            "current_thread",
            "save_handle_mark",
            "save_frame_record",
            "push_env",
            "handleize_receiver",
            "load",
            "link",
            "transition_to_native",
            "call_native",
            "transition_from_native",
            "restore_handle_mark",
            "throw_pending_exception",
            "return",
        ]
    );
    assert_eq!(stub.native_signature().to_string(), "(EHI)I");
    assert_eq!(stub.arg_slots(), 3);
    assert_eq!(stub.handle_count(), 1);
    assert_eq!(stub.max_locals(), 3);
}

#[test]
fn test_static_stub_handleizes_class() {
    let stub = synthesize(&method("demo/Factory", "make", "()Ljava/lang/Object;", true), Linkage::Standard).unwrap();
    assert!(matches!(
        &stub.ops()[position(&stub, "handleize_class")],
        Op::HandleizeClass { holder } if holder.binary_name() == "demo/Factory"
    ));
    assert_eq!(stub.native_signature().to_string(), "(EH)H");
    // unhand happens while the result handle is still live
    assert!(position(&stub, "unhand") < position(&stub, "restore_handle_mark"));
    assert!(!mnemonics(&stub).contains(&"check_cast"));
}

#[test]
fn test_references_are_handleized_and_primitives_loaded() {
    let stub = synthesize(
        &method("demo/Io", "write", "(Ljava/lang/String;J[BD)V", false),
        Linkage::Standard,
    )
    .unwrap();
    let marshal: Vec<&Op> = stub
        .ops()
        .iter()
        .filter(|op| matches!(op, Op::Load { .. } | Op::Handleize { .. }))
        .collect();
    assert_eq!(
        marshal,
        vec![
            &Op::Handleize { arg: 1 },
            &Op::Load { arg: 2, kind: ParameterKind::Long },
            &Op::Handleize { arg: 3 },
            &Op::Load { arg: 4, kind: ParameterKind::Double },
        ]
    );
    assert_eq!(stub.native_signature().to_string(), "(EHHJHD)V");
    // env + receiver + string + long(2) + array + double(2)
    assert_eq!(stub.arg_slots(), 8);
}

#[test]
fn test_static_parameters_start_at_zero() {
    let stub = synthesize(&method("demo/Math", "abs", "(I)I", true), Linkage::Standard).unwrap();
    assert!(stub.ops().contains(&Op::Load { arg: 0, kind: ParameterKind::Int }));
}

#[test]
fn test_transitions_bracket_the_call() {
    let stub = synthesize(&method("demo/Counter", "add", "(I)I", false), Linkage::Standard).unwrap();
    let call = position(&stub, "call_native");
    assert_eq!(position(&stub, "transition_to_native") + 1, call);
    assert_eq!(position(&stub, "transition_from_native"), call + 1);
    assert!(position(&stub, "link") < position(&stub, "transition_to_native"));
}

#[test]
fn test_pending_exception_checked_after_cleanup() {
    let stub = synthesize(&method("demo/Counter", "add", "(I)I", false), Linkage::Standard).unwrap();
    let throw = position(&stub, "throw_pending_exception");
    assert!(position(&stub, "restore_handle_mark") < throw);
    assert!(throw < position(&stub, "return"));
}

#[test]
fn test_check_cast_for_specific_result_class() {
    let stub = synthesize(
        &method("demo/Names", "first", "()Ljava/lang/String;", true),
        Linkage::Standard,
    )
    .unwrap();
    let cast = position(&stub, "check_cast");
    assert_eq!(stub.ops()[cast], Op::CheckCast { class: "java/lang/String".into() });
    assert!(position(&stub, "throw_pending_exception") < cast);
    assert_eq!(cast + 1, position(&stub, "return"));
}

#[test]
fn test_check_cast_for_array_result() {
    let stub = synthesize(&method("demo/Bytes", "read", "()[B", true), Linkage::Standard).unwrap();
    assert!(stub.ops().contains(&Op::CheckCast { class: "[B".into() }));
}

#[test]
fn test_lightweight_stub_is_bare() {
    let stub = synthesize(&method("demo/Clock", "mix", "(JD)V", true), lightweight()).unwrap();
    assert_eq!(mnemonics(&stub), vec!["load", "load", "link", "call_native", "return"]);
    assert!(stub.is_lightweight());
    assert!(!stub.ops().iter().any(|op| op.touches_frame_record() || op.touches_handle_stack()));
    assert_eq!(stub.native_signature().to_string(), "(JD)V");
    assert_eq!(stub.arg_slots(), 4);
}

#[test]
fn test_void_parameter_is_rejected() {
    let m = NativeMethod::new(
        crate::signature::HolderType::new("demo/Bad"),
        "f",
        crate::signature::SignatureDescriptor::from_kinds(&[ParameterKind::Int, ParameterKind::Void], ParameterKind::Void),
        true,
    );
    assert_eq!(
        synthesize(&m, Linkage::Standard).unwrap_err(),
        PreconditionError::VoidParameter { index: 1 }
    );
}

#[test]
fn test_lightweight_preconditions() {
    assert_eq!(
        synthesize(&method("demo/A", "f", "(I)V", false), lightweight()).unwrap_err(),
        PreconditionError::LightweightInstance
    );
    assert_eq!(
        synthesize(&method("demo/A", "f", "(ILjava/lang/Object;)V", true), lightweight()).unwrap_err(),
        PreconditionError::ReferenceInLightweight { index: 1 }
    );
    assert_eq!(
        synthesize(&method("demo/A", "f", "()Ljava/lang/Object;", true), lightweight()).unwrap_err(),
        PreconditionError::LightweightReferenceResult
    );
}

#[test]
fn test_trace_modes() {
    let m = method("demo/Counter", "add", "(I)I", false);
    let off = StubGenerator::new(TraceMode::Off).synthesize(&m, Linkage::Standard).unwrap();
    assert!(!off.ops().iter().any(Op::is_trace));

    let always = StubGenerator::new(TraceMode::Always).synthesize(&m, Linkage::Standard).unwrap();
    assert_eq!(position(&always, "trace_entry"), 1);
    assert!(position(&always, "restore_handle_mark") < position(&always, "trace_exit"));
    assert!(position(&always, "trace_exit") < position(&always, "throw_pending_exception"));
    assert!(matches!(
        &always.ops()[1],
        Op::TraceEntry { check: TraceCheck::Always, method } if method == "demo.Counter.add(int)"
    ));

    let dynamic = StubGenerator::new(TraceMode::Dynamic).synthesize(&m, Linkage::Standard).unwrap();
    assert!(matches!(&dynamic.ops()[1], Op::TraceEntry { check: TraceCheck::Dynamic, .. }));

    // lightweight stubs never trace
    let bare = StubGenerator::new(TraceMode::Always)
        .synthesize(&method("demo/Clock", "now", "()J", true), lightweight())
        .unwrap();
    assert!(!bare.ops().iter().any(Op::is_trace));
}

#[test]
fn test_trace_mode_names() {
    assert_eq!(TraceMode::from_name("Dynamic"), Some(TraceMode::Dynamic));
    assert_eq!(TraceMode::from_name("on"), Some(TraceMode::Always));
    assert_eq!(TraceMode::from_name("0"), Some(TraceMode::Off));
    assert_eq!(TraceMode::from_name("sometimes"), None);
}

#[test]
fn test_generator_caches_per_linkage() {
    let generator = StubGenerator::default();
    let m = method("demo/Clock", "now", "()J", true);
    let a = generator.stub_for(&m, Linkage::Standard).unwrap();
    let b = generator.stub_for(&m, Linkage::Standard).unwrap();
    let c = generator.stub_for(&m, lightweight()).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(generator.cached(), 2);
}

#[test]
fn test_failed_synthesis_is_not_cached() {
    let generator = StubGenerator::default();
    let m = method("demo/A", "f", "(I)V", false);
    assert!(generator.stub_for(&m, lightweight()).is_err());
    assert_eq!(generator.cached(), 0);
}

#[test]
fn test_native_layout_places_env_first() {
    let stub = synthesize(&method("demo/Counter", "add", "(IJ)D", false), Linkage::Standard).unwrap();
    let layout = stub.native_layout(Abi::SysV);
    assert_eq!(layout.to_string(), "CallingConvention[rdi:word rsi:word rdx:int rcx:long ]");
    assert_eq!(layout.overflow_size(), 0);
}

#[test]
fn test_json_listing() {
    let stub = synthesize(&method("demo/Counter", "add", "(I)I", false), Linkage::Standard).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stub.to_json().unwrap()).unwrap();
    assert_eq!(json["linkage"], "standard");
    assert_eq!(json["arg_slots"], 3);
    assert_eq!(json["ops"][0]["op"], "current_thread");
    assert_eq!(json["ops"][6]["symbols"]["short"], "Java_demo_Counter_add");
}

#[test]
fn test_display_listing() {
    let stub = synthesize(&method("demo/Clock", "now", "()J", true), lightweight()).unwrap();
    let text = stub.to_string();
    assert!(text.starts_with("stub demo.Clock.now() Lightweight native ()J"));
    assert!(text.contains("link Java_demo_Clock_now"));
}

// ----------------------------------------------------------------------------
// Execution failure paths
// ----------------------------------------------------------------------------

#[test]
fn test_link_failure_restores_state() {
    let stub = synthesize(&method("demo/Missing", "gone", "(Ljava/lang/Object;)V", false), Linkage::Standard).unwrap();
    let linkage = LinkageCache::default();
    let mut thread = thread();
    let receiver = thread.space().allocate("demo/Missing");
    let before = thread.current_frame_record();

    let err = stub
        .invoke(&mut thread, &linkage, &[Value::object(receiver), Value::object(receiver)])
        .unwrap_err();
    assert!(matches!(err, InvokeError::Link(LinkError::SymbolNotFound { .. })));
    assert_eq!(thread.handles().depth(), 0);
    assert_eq!(thread.current_frame_record(), before);
    assert_eq!(thread.frame_record_writes(), 0);
}

#[test]
fn test_argument_checks() {
    let stub = synthesize(&method("demo/Counter", "add", "(I)I", false), Linkage::Standard).unwrap();
    let linkage = LinkageCache::default();
    let mut thread = thread();
    let receiver = thread.space().allocate("demo/Counter");

    assert_eq!(
        stub.invoke(&mut thread, &linkage, &[Value::object(receiver)]),
        Err(InvokeError::ArgumentCount { expected: 2, found: 1 })
    );
    assert_eq!(
        stub.invoke(&mut thread, &linkage, &[Value::object(receiver), Value::Long(1)]),
        Err(InvokeError::ArgumentMismatch {
            index: 1,
            expected: ParameterKind::Int,
            found: ParameterKind::Long,
        })
    );
}

#[test]
fn test_handle_overflow_restores_state() {
    use crate::config::HandleConfig;

    let m = method("demo/Many", "take", "(Ljava/lang/Object;Ljava/lang/Object;Ljava/lang/Object;)V", true);
    let stub = synthesize(&m, Linkage::Standard).unwrap();
    let linkage = LinkageCache::default();
    linkage.registry().register_method(&m, |_: &mut NativeEnv<'_>, _: &[NativeValue]| NativeValue::Void);

    let config = HandleConfig { capacity: 2, limit: 2 };
    let mut thread = VmThread::with_config("small", Arc::new(ObjectSpace::new()), &config);
    let object = thread.space().allocate("java/lang/Object");
    let arg = Value::object(object);

    let err = stub.invoke(&mut thread, &linkage, &[arg, arg, arg]).unwrap_err();
    assert_eq!(err, InvokeError::HandleStackOverflow { limit: 2 });
    assert_eq!(thread.handles().depth(), 0);
}

#[test]
fn test_result_kind_mismatch() {
    let m = method("demo/Wrong", "value", "()I", true);
    let stub = synthesize(&m, Linkage::Standard).unwrap();
    let linkage = LinkageCache::default();
    linkage.registry().register_method(&m, |_: &mut NativeEnv<'_>, _: &[NativeValue]| NativeValue::Long(1));

    let mut thread = thread();
    let before = thread.current_frame_record();
    assert_eq!(
        stub.invoke(&mut thread, &linkage, &[]),
        Err(InvokeError::ResultMismatch {
            expected: crate::signature::NativeKind::Int,
            found: crate::signature::NativeKind::Long,
        })
    );
    assert_eq!(thread.handles().depth(), 0);
    assert_eq!(thread.current_frame_record(), before);
}

#[test]
fn test_externally_linked_address_is_not_callable() {
    struct Everything;
    impl crate::linker::Linker for Everything {
        fn resolve_native_symbol(&self, _name: &str) -> Option<crate::linker::NativeAddress> {
            crate::linker::NativeAddress::from_usize(0x4000)
        }
    }

    let stub = synthesize(&method("demo/Ext", "f", "()V", true), Linkage::Standard).unwrap();
    let linkage = LinkageCache::default();
    linkage.add_linker(Arc::new(Everything));
    let mut thread = thread();
    assert_eq!(stub.invoke(&mut thread, &linkage, &[]), Err(InvokeError::NotCallable(0x4000)));
    assert_eq!(thread.handles().depth(), 0);
}

#[test]
fn test_panicking_native_restores_state() {
    let m = method("demo/Panic", "boom", "(Ljava/lang/Object;)V", true);
    let stub = synthesize(&m, Linkage::Standard).unwrap();
    let linkage = LinkageCache::default();
    linkage
        .registry()
        .register_method(&m, |_: &mut NativeEnv<'_>, _: &[NativeValue]| -> NativeValue { panic!("native crash") });

    let mut thread = thread();
    let object = thread.space().allocate("java/lang/Object");
    let before = thread.current_frame_record();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        stub.invoke(&mut thread, &linkage, &[Value::object(object)])
    }));
    assert!(outcome.is_err());
    assert_eq!(thread.handles().depth(), 0);
    assert_eq!(thread.current_frame_record(), before);
}

#[test]
fn test_class_cast_failure() {
    let m = method("demo/Names", "first", "()Ljava/lang/String;", true);
    let stub = synthesize(&m, Linkage::Standard).unwrap();
    let linkage = LinkageCache::default();
    // hands back the class mirror handle, which is not a String
    linkage
        .registry()
        .register_method(&m, |_: &mut NativeEnv<'_>, args: &[NativeValue]| args[1]);

    let mut thread = thread();
    let err = stub.invoke(&mut thread, &linkage, &[]).unwrap_err();
    assert_eq!(
        err,
        InvokeError::ClassCast {
            expected: "java.lang.String".into(),
            found: "java.lang.Class".into(),
        }
    );
    assert_eq!(thread.handles().depth(), 0);
}

#[test]
fn test_pending_exception_is_cleared_when_rethrown() {
    let m = method("demo/Thrower", "fail", "()V", true);
    let stub = synthesize(&m, Linkage::Standard).unwrap();
    let linkage = LinkageCache::default();
    linkage.registry().register_method(&m, |env: &mut NativeEnv<'_>, _: &[NativeValue]| {
        env.throw(ManagedException::new("java/io/IOException", "disk"));
        NativeValue::Void
    });

    let mut thread = thread();
    let err = stub.invoke(&mut thread, &linkage, &[]).unwrap_err();
    assert_eq!(err, InvokeError::PendingException(ManagedException::new("java/io/IOException", "disk")));
    assert!(!thread.has_pending_exception());
    assert_eq!(thread.handle_stack_top(), crate::runtime::Mark(0));
}

#[test]
fn test_pending_exception_wins_over_bad_result() {
    let m = method("demo/Thrower", "count", "()I", true);
    let stub = synthesize(&m, Linkage::Standard).unwrap();
    let next = method("demo/Thrower", "seven", "()I", true);
    let next_stub = synthesize(&next, Linkage::Standard).unwrap();
    let linkage = LinkageCache::default();
    linkage.registry().register_method(&m, |env: &mut NativeEnv<'_>, _: &[NativeValue]| {
        env.throw(ManagedException::new("java/io/IOException", "closed"));
        NativeValue::Void
    });
    linkage
        .registry()
        .register_method(&next, |_: &mut NativeEnv<'_>, _: &[NativeValue]| NativeValue::Int(7));

    let mut thread = thread();
    let before = thread.current_frame_record();
    assert_eq!(
        stub.invoke(&mut thread, &linkage, &[]),
        Err(InvokeError::PendingException(ManagedException::new("java/io/IOException", "closed")))
    );
    assert!(!thread.has_pending_exception());
    assert_eq!(thread.handles().depth(), 0);
    assert_eq!(thread.current_frame_record(), before);

    // the exception belonged to the first call only
    assert_eq!(next_stub.invoke(&mut thread, &linkage, &[]), Ok(Value::Int(7)));
}

#[test]
fn test_pending_exception_skips_reference_unwrap() {
    let m = method("demo/Thrower", "name", "()Ljava/lang/String;", true);
    let stub = synthesize(&m, Linkage::Standard).unwrap();
    let linkage = LinkageCache::default();
    linkage.registry().register_method(&m, |env: &mut NativeEnv<'_>, _: &[NativeValue]| {
        env.throw(ManagedException::without_message("java/lang/IllegalStateException"));
        NativeValue::Int(0)
    });

    let mut thread = thread();
    let err = stub.invoke(&mut thread, &linkage, &[]).unwrap_err();
    assert_eq!(
        err,
        InvokeError::PendingException(ManagedException::without_message("java/lang/IllegalStateException"))
    );
    assert!(!thread.has_pending_exception());
    assert_eq!(thread.handles().depth(), 0);
}
