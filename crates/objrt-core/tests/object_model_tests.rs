//! Integration tests for the object model
//!
//! Tests cover:
//! - Positional construction and field lookup by name and index
//! - Arity errors with no observable partial state
//! - Vtable dispatch from generated method bodies
//! - Default construction policies

use objrt_core::{
    construct, construct_boxed, construct_with, ClassDescriptor, ClassHooks, ClassId,
    DefaultConstructors, Instance, Method, Runtime, RuntimeError, RuntimeOptions, RuntimeResult,
    VTable, Value,
};
use std::cell::Cell;
use std::rc::Rc;

struct DropCounter(Rc<Cell<usize>>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

fn pair_swap(this: &mut Instance, _args: Vec<Value>) -> RuntimeResult<Value> {
    let first = this.take_field("first")?;
    let second = this.take_field("second")?;
    this.set_field("first", second)?;
    this.set_field("second", first)?;
    Ok(Value::null())
}

fn pair_to_product(this: &mut Instance, _args: Vec<Value>) -> RuntimeResult<Value> {
    Ok(Value::product(vec![this.get("first")?, this.get("second")?]))
}

static PAIR_METHODS: [Method; 2] = [
    Method::new("swap", pair_swap),
    Method::new("toProduct", pair_to_product),
];
const PAIR_SWAP: usize = 0;
const PAIR_TO_PRODUCT: usize = 1;

static PAIR: ClassDescriptor = ClassDescriptor::new(ClassId(10), "Pair", &["first", "second"])
    .with_vtable(VTable::new(&PAIR_METHODS));

fn origin() -> Vec<Value> {
    vec![Value::real(0.0), Value::real(0.0)]
}

static POINT: ClassDescriptor =
    ClassDescriptor::new(ClassId(11), "Point", &["x", "y"]).with_default_constructor(origin);

#[test]
fn test_pair_scenario() {
    let mut pair = construct(&PAIR, vec![Value::int(3), Value::int(4)]).unwrap();
    assert_eq!(pair.field("first").unwrap(), &Value::int(3));
    assert_eq!(pair.field("second").unwrap(), &Value::int(4));

    pair.free_fields().unwrap();
    assert!(matches!(
        pair.field("first"),
        Err(RuntimeError::FieldNotFound { class: "Pair", .. })
    ));
}

#[test]
fn test_arity_mismatch_binds_nothing() {
    let freed = Rc::new(Cell::new(0));

    for args in [
        vec![Value::opaque(DropCounter(freed.clone()))],
        vec![
            Value::opaque(DropCounter(freed.clone())),
            Value::opaque(DropCounter(freed.clone())),
            Value::opaque(DropCounter(freed.clone())),
        ],
    ] {
        let err = construct(&PAIR, args).unwrap_err();
        assert!(matches!(err, RuntimeError::Arity { expected: 2, .. }));
    }

    // Rejected arguments are dropped with the error, never retained
    assert_eq!(freed.get(), 4);
}

#[test]
fn test_typed_constructor_rollback() {
    let freed = Rc::new(Cell::new(0));

    // A typed constructor converting its second argument fails
    let typed_args = vec![
        Ok(Value::opaque(DropCounter(freed.clone()))),
        Value::text("not a number")
            .as_int()
            .map(Value::int)
            .ok_or(RuntimeError::Ownership { kind: "text" }),
    ];

    assert!(construct_with(&PAIR, typed_args).is_err());
    assert_eq!(freed.get(), 1);
}

#[test]
fn test_vtable_dispatch() {
    let mut pair = construct(&PAIR, vec![Value::int(1), Value::text("b")]).unwrap();

    pair.invoke(PAIR_SWAP, vec![]).unwrap();
    assert_eq!(pair.field("first").unwrap().as_text(), Some("b"));
    assert_eq!(pair.field("second").unwrap(), &Value::int(1));

    // text is uniquely owned, so cloning it out of a field fails
    assert!(matches!(
        pair.invoke(PAIR_TO_PRODUCT, vec![]),
        Err(RuntimeError::Ownership { kind: "text" })
    ));

    pair.set_field("first", Value::text("b").into_shared()).unwrap();
    let product = pair.invoke(PAIR_TO_PRODUCT, vec![]).unwrap();
    assert_eq!(product.to_string(), "mk_(\"b\", 1)");
    assert_eq!(pair.field("first").unwrap().share_count(), Some(2));
}

#[test]
fn test_boxed_instance_fields() {
    let inner = construct_boxed(&PAIR, vec![Value::int(1), Value::int(2)]).unwrap();
    let mut outer = construct(&PAIR, vec![inner, Value::null()]).unwrap();

    let inner = outer.field_mut("first").unwrap().as_object_mut().unwrap();
    inner.set_field("second", Value::int(20)).unwrap();

    assert_eq!(outer.to_string(), "Pair{first = Pair{first = 1, second = 20}, second = nil}");
    assert_eq!(
        outer.fields().map(|(name, _)| name).collect::<Vec<_>>(),
        vec!["first", "second"]
    );
}

#[test]
fn test_default_construction_via_runtime() {
    let mut rt = Runtime::new();
    rt.register_class(&PAIR, ClassHooks::new()).unwrap();
    rt.register_class(&POINT, ClassHooks::new()).unwrap();

    let point = rt.construct_default(ClassId(11)).unwrap();
    assert_eq!(point.field("x").unwrap(), &Value::real(0.0));
    assert!(matches!(
        rt.construct_default(ClassId(10)),
        Err(RuntimeError::UnsupportedOperation { class: "Pair", .. })
    ));

    let mut disabled = Runtime::with_options(RuntimeOptions {
        default_constructors: DefaultConstructors::Disabled,
        ..RuntimeOptions::default()
    });
    disabled.register_class(&POINT, ClassHooks::new()).unwrap();
    assert!(disabled.construct_default(ClassId(11)).is_err());
}

#[test]
fn test_class_id_collision() {
    static IMPOSTOR: ClassDescriptor = ClassDescriptor::new(ClassId(10), "Impostor", &[]);

    let mut rt = Runtime::new();
    rt.register_class(&PAIR, ClassHooks::new()).unwrap();
    let err = rt.register_class(&IMPOSTOR, ClassHooks::new()).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::DuplicateClass {
            id: ClassId(10),
            existing: "Pair",
            name: "Impostor",
        }
    );
}
