//! A class stub in the shape the translator emits, driven end to end
//!
//! The record `TSeq` has two components plus a cached field count. Its
//! constructor lives in vtable slot 0 and runs on a null-filled shell, the
//! convention selected through the options file.

use objrt_core::{
    ClassDescriptor, ClassHooks, ClassId, ClassState, DefaultConstructors, Instance, Method,
    Runtime, RuntimeError, RuntimeOptions, RuntimeResult, VTable, Value,
};
use std::io::Write;

const CLASS_ID_TSEQ: ClassId = ClassId(1);
const TSEQ_CONSTRUCTOR: usize = 0;
const TSEQ_NUM_FIELDS: i64 = 2;

fn tseq_constructor(this: &mut Instance, args: Vec<Value>) -> RuntimeResult<Value> {
    let [component1, component2]: [Value; 2] =
        args.try_into().map_err(|args: Vec<Value>| RuntimeError::Arity {
            class: "TSeq",
            expected: 2,
            got: args.len(),
        })?;
    this.set_field("component1", component1)?;
    this.set_field("component2", component2)?;
    this.set_field("numFields", Value::int(TSEQ_NUM_FIELDS))?;
    Ok(Value::null())
}

static TSEQ_VTABLE: [Method; 1] = [Method::new("TSeq", tseq_constructor)];

static TSEQ: ClassDescriptor = ClassDescriptor::new(
    CLASS_ID_TSEQ,
    "TSeq",
    &["component1", "component2", "numFields"],
)
.with_vtable(VTable::new(&TSEQ_VTABLE));

fn tseq_const_init(state: &mut ClassState) -> RuntimeResult<()> {
    state.set_const("numFields", Value::int(TSEQ_NUM_FIELDS));
    Ok(())
}

fn tseq_const_shutdown(state: &mut ClassState) -> RuntimeResult<()> {
    if let Some(num_fields) = state.take_const("numFields") {
        num_fields.release();
    }
    Ok(())
}

fn tseq_hooks() -> ClassHooks {
    ClassHooks::new()
        .const_init(tseq_const_init)
        .const_shutdown(tseq_const_shutdown)
}

fn tseq_new(rt: &Runtime, component1: Value, component2: Value) -> RuntimeResult<Value> {
    let mut this = rt.construct_default(CLASS_ID_TSEQ)?;
    this.invoke(TSEQ_CONSTRUCTOR, vec![component1, component2])?;
    Ok(Value::object(this))
}

fn options_from_file(contents: &str) -> RuntimeOptions {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    RuntimeOptions::from_file(file.path()).unwrap()
}

fn runtime() -> Runtime {
    let options = options_from_file("default_constructors = \"null-filled\"\n");
    assert_eq!(options.default_constructors, DefaultConstructors::NullFilled);

    let mut rt = Runtime::with_options(options);
    rt.register_class(&TSEQ, tseq_hooks()).unwrap();
    rt
}

#[test]
fn test_generated_class_round_trip() {
    let mut rt = runtime();
    rt.startup().unwrap();

    assert_eq!(
        rt.constant(CLASS_ID_TSEQ, "numFields").unwrap().unwrap(),
        Value::int(TSEQ_NUM_FIELDS)
    );

    let mut value = tseq_new(&rt, Value::int(7), Value::seq(vec![Value::char('a')])).unwrap();
    let tseq = value.as_object().unwrap();
    assert_eq!(tseq.class_id(), CLASS_ID_TSEQ);
    assert_eq!(tseq.field("component1").unwrap(), &Value::int(7));
    assert_eq!(tseq.field("numFields").unwrap(), &Value::int(2));
    assert_eq!(
        value.to_string(),
        "TSeq{component1 = 7, component2 = ['a'], numFields = 2}"
    );

    value.as_object_mut().unwrap().free_fields().unwrap();
    value.release();

    rt.shutdown().unwrap();
    assert_eq!(rt.class_state(CLASS_ID_TSEQ).unwrap().const_count(), 0);
}

#[test]
fn test_generated_constructor_arity() {
    let rt = runtime();
    let mut shell = rt.construct_default(CLASS_ID_TSEQ).unwrap();

    let err = shell.invoke(TSEQ_CONSTRUCTOR, vec![Value::int(1)]).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::Arity {
            class: "TSeq",
            expected: 2,
            got: 1
        }
    );
    assert!(shell.field("component1").unwrap().is_null());
}

#[test]
fn test_positional_construction_matches_generated_constructor() {
    let rt = runtime();
    let direct = rt
        .construct(
            CLASS_ID_TSEQ,
            vec![Value::int(7), Value::bool(true), Value::int(TSEQ_NUM_FIELDS)],
        )
        .unwrap();
    let generated = tseq_new(&rt, Value::int(7), Value::bool(true)).unwrap();

    assert_eq!(Value::object(direct), generated);
}
