use super::*;
use arc_ast::build::ProgramBuilder;
use arc_ast::{BinaryOp, ElseIf, ExprId, Program, Span};
use insta::assert_snapshot;

fn span() -> Span {
    Span::new(10, 20)
}

fn messages(errors: &[TypeError]) -> String {
    errors
        .iter()
        .map(TypeError::message)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Check ────────────────────────────────────────────────────────

#[test]
fn identical_concrete_types_record_nothing() {
    let mut cs = ConstraintSystem::new();
    check(&mut cs, &Type::f32(), &Type::f32(), span(), "test").unwrap();
    check(&mut cs, &Type::chan(Type::i64()), &Type::chan(Type::i64()), span(), "test").unwrap();
    assert!(cs.is_empty());
}

#[test]
fn invalid_passes_against_anything() {
    let mut cs = ConstraintSystem::new();
    check(&mut cs, &Type::Invalid, &Type::series(Type::f64()), span(), "test").unwrap();
    check(&mut cs, &Type::string(), &Type::Invalid, span(), "test").unwrap();
    assert!(cs.is_empty());
}

#[test]
fn variable_records_one_constraint() {
    let mut cs = ConstraintSystem::new();
    let var = Type::variable("lit_0_1", Some(VarConstraint::IntegerConstant));
    check(&mut cs, &Type::i32(), &var, span(), "assignment").unwrap();
    assert_eq!(cs.len(), 1);
    let c = &cs.constraints()[0];
    assert_eq!(c.left, Type::i32());
    assert_eq!(c.right, var);
    assert_eq!(c.reason, "assignment");
    assert_eq!(c.source, span());
}

#[test]
fn nested_wrappers_extend_the_reason() {
    let mut cs = ConstraintSystem::new();
    let var = Type::variable("T", None);
    check(
        &mut cs,
        &Type::chan(Type::series(var)),
        &Type::chan(Type::series(Type::f32())),
        span(),
        "test",
    )
    .unwrap();
    assert_eq!(cs.len(), 1);
    assert_snapshot!(cs.constraints()[0].reason, @"test (element types) (element types)");
}

#[test]
fn kind_mismatch() {
    let mut cs = ConstraintSystem::new();
    let err = check(&mut cs, &Type::i32(), &Type::f32(), span(), "test").unwrap_err();
    assert_snapshot!(err, @"[10:20] type mismatch: expected i32, got f32 in test");
}

#[test]
fn shape_mismatch_is_reported_before_unwrapping() {
    let mut cs = ConstraintSystem::new();
    let err = check(&mut cs, &Type::chan(Type::i32()), &Type::i32(), span(), "test").unwrap_err();
    assert_snapshot!(err.message(), @"type mismatch: expected chan i32, got i32 in test");
}

#[test]
fn element_mismatch_carries_the_unwrap_trail() {
    let mut cs = ConstraintSystem::new();
    let err = check(
        &mut cs,
        &Type::series(Type::i64()),
        &Type::series(Type::u8()),
        span(),
        "argument",
    )
    .unwrap_err();
    assert_snapshot!(err.message(), @"type mismatch: expected i64, got u8 in argument (element types)");
}

#[test]
fn unit_mismatch() {
    let mut cs = ConstraintSystem::new();
    let psi = Type::f32().with_unit(units::resolve("psi").unwrap());
    let bar = Type::f32().with_unit(units::resolve("bar").unwrap());
    let err = check(&mut cs, &psi, &bar, span(), "assignment").unwrap_err();
    assert_snapshot!(err.message(), @"type mismatch: unit psi does not match bar in assignment");

    let err = check(&mut cs, &Type::f32(), &psi, span(), "assignment").unwrap_err();
    assert_snapshot!(err.message(), @"type mismatch: unit none does not match psi in assignment");
}

#[test]
fn unit_names_are_canonical() {
    let mut cs = ConstraintSystem::new();
    let upper = Type::f64().with_unit(units::resolve("Hz").unwrap());
    let lower = Type::f64().with_unit(units::resolve("hz").unwrap());
    check(&mut cs, &upper, &lower, span(), "test").unwrap();
}

// ── Compatibility predicates ─────────────────────────────────────

#[test]
fn operand_compatibility() {
    assert!(compatible(&Type::i32(), &Type::i32()));
    assert!(compatible(&Type::chan(Type::f32()), &Type::f32()));
    assert!(compatible(&Type::series(Type::f32()), &Type::f32()));
    assert!(!compatible(&Type::chan(Type::f32()), &Type::series(Type::f32())));
    assert!(!compatible(&Type::i32(), &Type::i64()));
    assert!(!compatible(&Type::variable("T", None), &Type::i32()));
    assert!(!compatible(&Type::Invalid, &Type::i32()));

    let psi = Type::f32().with_unit(units::resolve("psi").unwrap());
    assert!(compatible(&psi, &Type::f32()));
}

#[test]
fn assignment_compatibility() {
    assert!(assignment_compatible(&Type::i32(), &Type::i32()));
    assert!(assignment_compatible(&Type::series(Type::f64()), &Type::series(Type::f64())));
    assert!(assignment_compatible(&Type::i32(), &Type::variable("T", None)));
    assert!(!assignment_compatible(&Type::i32(), &Type::series(Type::i32())));
    assert!(!assignment_compatible(&Type::i32(), &Type::i64()));
}

#[test]
fn literal_assignment_widening() {
    assert!(literal_assignment_compatible(&Type::u8(), &Type::i64()));
    assert!(literal_assignment_compatible(&Type::f32(), &Type::i64()));
    assert!(literal_assignment_compatible(&Type::f32(), &Type::u16()));
    assert!(!literal_assignment_compatible(&Type::i32(), &Type::f64()));
    assert!(!literal_assignment_compatible(&Type::i32(), &Type::string()));
}

#[test]
fn narrowing_conversions() {
    assert!(is_narrowing(&Type::i64(), &Type::i32()));
    assert!(is_narrowing(&Type::u32(), &Type::i8()));
    assert!(is_narrowing(&Type::f64(), &Type::f32()));
    assert!(!is_narrowing(&Type::i32(), &Type::i64()));
    assert!(!is_narrowing(&Type::f64(), &Type::i32()));
    assert!(!is_narrowing(&Type::i32(), &Type::i32()));
}

#[test]
fn check_assignment_accepts_narrowing_and_literals() {
    let mut cs = ConstraintSystem::new();
    check_assignment(&mut cs, &Type::i32(), &Type::i64(), false, span(), "x").unwrap();
    check_assignment(&mut cs, &Type::f32(), &Type::f64(), false, span(), "x").unwrap();
    check_assignment(&mut cs, &Type::u8(), &Type::i64(), true, span(), "x").unwrap();
    assert!(cs.is_empty());

    let err = check_assignment(&mut cs, &Type::i32(), &Type::f32(), false, span(), "x").unwrap_err();
    assert_snapshot!(err.message(), @"type mismatch: expected i32, got f32 in x");
}

#[test]
fn type_display() {
    let psi = units::resolve("psi").unwrap();
    assert_eq!(Type::f32().with_unit(psi).to_string(), "f32 psi");
    assert_eq!(Type::chan(Type::series(Type::u8())).to_string(), "chan series u8");
    assert_eq!(
        Type::variable("lit_3_4", Some(VarConstraint::FloatConstant)).to_string(),
        "lit_3_4:float"
    );
    let func = Type::function(FunctionType {
        inputs: vec![Param::new("a", Type::i32())],
        outputs: vec![Param::new("output", Type::f64())],
        config: Vec::new(),
    });
    assert_eq!(func.to_string(), "func(a i32) f64");
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_type() -> impl Strategy<Value = Type> {
        let leaf = prop_oneof![
            prop::sample::select(Kind::NUMERIC.to_vec()).prop_map(Type::scalar),
            Just(Type::string()),
            Just(Type::variable("T", None)),
        ];
        leaf.prop_recursive(3, 8, 1, |inner| {
            prop_oneof![inner.clone().prop_map(Type::chan), inner.prop_map(Type::series)]
        })
    }

    proptest! {
        #[test]
        fn check_is_reflexive(t in arb_type()) {
            let mut cs = ConstraintSystem::new();
            prop_assert!(check(&mut cs, &t, &t, span(), "test").is_ok());
            if !t.contains_variable() {
                prop_assert!(cs.is_empty());
            }
        }

        #[test]
        fn invalid_never_fails(t in arb_type()) {
            let mut cs = ConstraintSystem::new();
            prop_assert!(check(&mut cs, &Type::Invalid, &t, span(), "test").is_ok());
            prop_assert!(check(&mut cs, &t, &Type::Invalid, span(), "test").is_ok());
            prop_assert!(cs.is_empty());
        }

        #[test]
        fn check_records_at_most_one_constraint(a in arb_type(), b in arb_type()) {
            let mut cs = ConstraintSystem::new();
            let _ = check(&mut cs, &a, &b, span(), "test");
            prop_assert!(cs.len() <= 1);
        }

        #[test]
        fn concrete_success_implies_equality(a in arb_type(), b in arb_type()) {
            prop_assume!(!a.contains_variable() && !b.contains_variable());
            let mut cs = ConstraintSystem::new();
            let ok = check(&mut cs, &a, &b, span(), "test").is_ok();
            prop_assert_eq!(ok, equal(&a, &b));
        }

        #[test]
        fn predicates_are_symmetric(a in arb_type(), b in arb_type()) {
            prop_assert_eq!(structural_match(&a, &b), structural_match(&b, &a));
            prop_assert_eq!(compatible(&a, &b), compatible(&b, &a));
        }

        #[test]
        fn narrowing_is_one_way(
            a in prop::sample::select(Kind::NUMERIC.to_vec()),
            b in prop::sample::select(Kind::NUMERIC.to_vec()),
        ) {
            let (a, b) = (Type::scalar(a), Type::scalar(b));
            prop_assert!(!(is_narrowing(&a, &b) && is_narrowing(&b, &a)));
        }
    }
}

// ── Expression inference ─────────────────────────────────────────

fn infer_with(program: &Program, globals: Vec<Symbol>, expr: ExprId) -> (Type, Vec<TypeError>, ConstraintSystem) {
    let mut scopes = ScopeTree::new();
    let root = scopes.root();
    for symbol in globals {
        scopes.add(root, symbol).unwrap();
    }
    let mut cs = ConstraintSystem::new();
    let (ty, errors) = infer_expr(program, &scopes, root, &mut cs, expr);
    (ty, errors, cs)
}

fn infer_ok(b: ProgramBuilder, globals: Vec<Symbol>, expr: ExprId) -> Type {
    let program = b.finish();
    let (ty, errors, _) = infer_with(&program, globals, expr);
    assert!(errors.is_empty(), "unexpected type errors: {:?}", errors);
    ty
}

fn infer_err(b: ProgramBuilder, globals: Vec<Symbol>, expr: ExprId) -> String {
    let program = b.finish();
    let (_, errors, _) = infer_with(&program, globals, expr);
    assert!(!errors.is_empty(), "expected type errors, got none");
    messages(&errors)
}

fn channels() -> Vec<Symbol> {
    vec![
        Symbol::channel("sensor_f32", 1, Type::f32()),
        Symbol::channel("sensor_f64", 2, Type::f64()),
        Symbol::new("samples", SymbolKind::Variable, Type::series(Type::i64())),
        Symbol::new("name", SymbolKind::Variable, Type::string()),
        Symbol::new("count", SymbolKind::Variable, Type::i32()),
        Symbol::new("ratio", SymbolKind::Variable, Type::f32()),
    ]
}

#[test]
fn numeric_literals_become_variables() {
    let mut b = ProgramBuilder::new();
    let int = b.int(42);
    let float = b.float(3.14);
    let program = b.finish();

    let (ty, _, _) = infer_with(&program, Vec::new(), int);
    assert_snapshot!(ty, @"lit_0_2:integer");
    let (ty, _, _) = infer_with(&program, Vec::new(), float);
    assert_snapshot!(ty, @"lit_3_7:float");
}

#[test]
fn unit_literal_carries_its_unit() {
    let mut b = ProgramBuilder::new();
    let q = b.quantity("5", "psi");
    let ty = infer_ok(b, Vec::new(), q);
    assert_eq!(ty.unit().map(|u| u.name.as_str()), Some("psi"));
    assert!(ty.is_variable());
}

#[test]
fn unknown_unit_on_literal() {
    let mut b = ProgramBuilder::new();
    let q = b.quantity("5", "furlong");
    assert_snapshot!(infer_err(b, Vec::new(), q), @"unknown unit: furlong");
}

#[test]
fn string_and_bool_literals() {
    let mut b = ProgramBuilder::new();
    let s = b.string("x");
    let t = b.bool(true);
    let program = b.finish();
    assert_eq!(infer_with(&program, Vec::new(), s).0, Type::string());
    assert_eq!(infer_with(&program, Vec::new(), t).0, Type::u8());
}

#[test]
fn channel_plus_literal_is_element_type() {
    let mut b = ProgramBuilder::new();
    let chan = b.ident("sensor_f32");
    let ten = b.int(10);
    let sum = b.binary(chan, BinaryOp::Add, ten);
    let program = b.finish();
    let (ty, errors, cs) = infer_with(&program, channels(), sum);
    assert!(errors.is_empty());
    assert_eq!(ty, Type::f32());
    assert_eq!(cs.len(), 1);
    assert_snapshot!(cs.constraints()[0].reason, @"operands of '+'");
}

#[test]
fn channel_divided_by_literal() {
    let mut b = ProgramBuilder::new();
    let chan = b.ident("sensor_f64");
    let two = b.int(2);
    let quot = b.binary(chan, BinaryOp::Div, two);
    assert_eq!(infer_ok(b, channels(), quot), Type::f64());
}

#[test]
fn series_arithmetic_stays_a_series() {
    let mut b = ProgramBuilder::new();
    let s = b.ident("samples");
    let ten = b.int(10);
    let right = b.binary(s, BinaryOp::Add, ten);
    assert_eq!(infer_ok(b, channels(), right), Type::series(Type::i64()));

    let mut b = ProgramBuilder::new();
    let ten = b.int(10);
    let s = b.ident("samples");
    let left = b.binary(ten, BinaryOp::Mul, s);
    assert_eq!(infer_ok(b, channels(), left), Type::series(Type::i64()));
}

#[test]
fn comparisons_and_logic_yield_u8() {
    let mut b = ProgramBuilder::new();
    let x = b.ident("ratio");
    let half = b.float(0.5);
    let cmp = b.binary(x, BinaryOp::Gt, half);
    let flag = b.bool(true);
    let and = b.binary(cmp, BinaryOp::And, flag);
    let program = b.finish();
    assert_eq!(infer_with(&program, channels(), cmp).0, Type::u8());
    assert_eq!(infer_with(&program, channels(), and).0, Type::u8());
}

#[test]
fn mismatched_operands() {
    let mut b = ProgramBuilder::new();
    let a = b.ident("count");
    let r = b.ident("ratio");
    let sum = b.binary(a, BinaryOp::Add, r);
    assert_snapshot!(infer_err(b, channels(), sum), @"type mismatch: expected i32, got f32 in operands of '+'");
}

#[test]
fn power_unwraps_its_base() {
    let mut b = ProgramBuilder::new();
    let s = b.ident("sensor_f64");
    let two = b.int(2);
    let pow = b.binary(s, BinaryOp::Pow, two);
    assert_eq!(infer_ok(b, channels(), pow), Type::f64());
}

fn measured() -> Vec<Symbol> {
    let metres = || Type::f64().with_unit(units::resolve("m").unwrap());
    vec![
        Symbol::new("dist", SymbolKind::Variable, metres()),
        Symbol::new("height", SymbolKind::Variable, metres()),
        Symbol::new("elapsed", SymbolKind::Variable, Type::f64().with_unit(units::resolve("s").unwrap())),
        Symbol::new("n", SymbolKind::Variable, Type::i32()),
        Symbol::new("name", SymbolKind::Variable, Type::string()),
    ]
}

#[test]
fn operand_units_must_share_a_dimension() {
    let mut b = ProgramBuilder::new();
    let five = b.quantity("5", "m");
    let three = b.quantity("3", "s");
    let sum = b.binary(five, BinaryOp::Add, three);
    assert_snapshot!(infer_err(b, Vec::new(), sum), @"incompatible units in operands of '+': m and s");

    let mut b = ProgramBuilder::new();
    let d = b.ident("dist");
    let t = b.ident("elapsed");
    let sum = b.binary(d, BinaryOp::Add, t);
    assert_snapshot!(infer_err(b, measured(), sum), @"incompatible units in operands of '+': m and s");

    let mut b = ProgramBuilder::new();
    let d = b.ident("dist");
    let t = b.ident("elapsed");
    let cmp = b.binary(d, BinaryOp::Lt, t);
    assert_snapshot!(infer_err(b, measured(), cmp), @"incompatible units in operands of '<': m and s");

    let mut b = ProgramBuilder::new();
    let d = b.ident("dist");
    let h = b.ident("height");
    let sum = b.binary(d, BinaryOp::Add, h);
    let ty = infer_ok(b, measured(), sum);
    assert_eq!(ty.unit().map(|u| u.name.as_str()), Some("m"));
}

#[test]
fn exponent_of_a_unitless_base_needs_only_a_number() {
    let mut b = ProgramBuilder::new();
    let f64_ty = b.ty("f64");
    let five = b.float(5.0);
    let x = b.decl("x", Some(f64_ty), five);
    let i32_ty = b.ty("i32");
    let two = b.int(2);
    let y = b.decl("y", Some(i32_ty), two);
    let base = b.ident("x");
    let exp = b.ident("y");
    let pow = b.binary(base, BinaryOp::Pow, exp);
    let z = b.decl("z", None, pow);
    b.func("f").body(vec![x, y, z]);
    let program = b.finish();
    let analysis = analyze_ok(&program, Vec::new());
    assert_eq!(analysis.type_of(pow), Some(&Type::f64()));

    let mut b = ProgramBuilder::new();
    let base = b.ident("n");
    let exp = b.ident("name");
    let pow = b.binary(base, BinaryOp::Pow, exp);
    assert_snapshot!(infer_err(b, measured(), pow), @"exponent must be numeric, got str");
}

#[test]
fn exponent_of_a_base_with_a_unit() {
    let mut b = ProgramBuilder::new();
    let d = b.ident("dist");
    let two = b.int(2);
    let square = b.binary(d, BinaryOp::Pow, two);
    let d = b.ident("dist");
    let two = b.int(2);
    let minus_two = b.neg(two);
    let inverse = b.binary(d, BinaryOp::Pow, minus_two);
    let program = b.finish();
    for expr in [square, inverse] {
        let (ty, errors, _) = infer_with(&program, measured(), expr);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(ty.unit().map(|u| u.name.as_str()), Some("m"));
    }

    let mut b = ProgramBuilder::new();
    let d = b.ident("dist");
    let n = b.ident("n");
    let pow = b.binary(d, BinaryOp::Pow, n);
    assert_snapshot!(infer_err(b, measured(), pow), @"base with unit m requires a literal integer exponent");

    let mut b = ProgramBuilder::new();
    let d = b.ident("dist");
    let two = b.float(2.0);
    let pow = b.binary(d, BinaryOp::Pow, two);
    assert_snapshot!(infer_err(b, measured(), pow), @"base with unit m requires a literal integer exponent");

    let mut b = ProgramBuilder::new();
    let d = b.ident("dist");
    let two = b.quantity("2", "s");
    let pow = b.binary(d, BinaryOp::Pow, two);
    assert_snapshot!(infer_err(b, measured(), pow), @"exponent must be dimensionless, got unit s");

    let mut b = ProgramBuilder::new();
    let n = b.ident("n");
    let t = b.ident("elapsed");
    let pow = b.binary(n, BinaryOp::Pow, t);
    assert_snapshot!(infer_err(b, measured(), pow), @"exponent must be dimensionless, got unit s");
}

#[test]
fn unary_unwraps_channels_only() {
    let mut b = ProgramBuilder::new();
    let c = b.ident("sensor_f32");
    let neg = b.neg(c);
    let s = b.ident("samples");
    let neg_series = b.neg(s);
    let program = b.finish();
    assert_eq!(infer_with(&program, channels(), neg).0, Type::f32());
    assert_eq!(infer_with(&program, channels(), neg_series).0, Type::series(Type::i64()));
}

#[test]
fn unresolved_identifier_is_invalid_without_error() {
    let mut b = ProgramBuilder::new();
    let x = b.ident("nowhere");
    let program = b.finish();
    let (ty, errors, _) = infer_with(&program, Vec::new(), x);
    assert_eq!(ty, Type::Invalid);
    assert!(errors.is_empty());
}

#[test]
fn indexing_and_slicing() {
    let mut b = ProgramBuilder::new();
    let s = b.ident("samples");
    let zero = b.int(0);
    let at = b.index(s, zero);
    let s2 = b.ident("samples");
    let one = b.int(1);
    let slice = b.slice(s2, Some(one), None);
    let program = b.finish();
    assert_eq!(infer_with(&program, channels(), at).0, Type::i64());
    assert_eq!(infer_with(&program, channels(), slice).0, Type::series(Type::i64()));
}

#[test]
fn indexing_a_scalar() {
    let mut b = ProgramBuilder::new();
    let c = b.ident("count");
    let zero = b.int(0);
    let at = b.index(c, zero);
    assert_snapshot!(infer_err(b, channels(), at), @"cannot index into i32");
}

#[test]
fn casts() {
    let mut b = ProgramBuilder::new();
    let f64_ty = b.ty("f64");
    let c = b.ident("count");
    let ok = b.cast(f64_ty, c);
    assert_eq!(infer_ok(b, channels(), ok), Type::f64());

    let mut b = ProgramBuilder::new();
    let f32_ty = b.ty("f32");
    let n = b.ident("name");
    let bad = b.cast(f32_ty, n);
    assert_snapshot!(infer_err(b, channels(), bad), @"cannot cast str to f32");
}

#[test]
fn series_literals() {
    let mut b = ProgramBuilder::new();
    let one = b.int(1);
    let count = b.ident("count");
    let series = b.series(vec![one, count]);
    assert_eq!(infer_ok(b, channels(), series), Type::series(Type::i32()));

    let mut b = ProgramBuilder::new();
    let empty = b.series(Vec::new());
    let ty = infer_ok(b, channels(), empty);
    assert!(ty.is_series());
    assert!(ty.elem().is_some_and(Type::is_variable), "{}", ty);
}

#[test]
fn empty_series_take_the_declared_element_type() {
    let mut b = ProgramBuilder::new();
    let i32_ty = b.ty("i32");
    let series_ty = b.series_ty(i32_ty);
    let empty = b.series(Vec::new());
    let decl = b.decl("arr", Some(series_ty), empty);
    b.func("f").body(vec![decl]);
    let program = b.finish();
    analyze_ok(&program, Vec::new());
}

#[test]
fn builtins() {
    let mut b = ProgramBuilder::new();
    let s = b.ident("samples");
    let len = b.call("len", vec![s]);
    let now = b.call("now", Vec::new());
    let program = b.finish();
    assert_eq!(infer_with(&program, channels(), len).0, Type::i64());
    assert_eq!(infer_with(&program, channels(), now).0, Type::i64());
}

#[test]
fn call_checks_arguments() {
    let add = Symbol::new(
        "add",
        SymbolKind::Function,
        Type::function(FunctionType {
            inputs: vec![Param::new("a", Type::i32()), Param::new("b", Type::i32())],
            outputs: vec![Param::new("output", Type::i32())],
            config: Vec::new(),
        }),
    );

    let mut b = ProgramBuilder::new();
    let one = b.int(1);
    let two = b.int(2);
    let call = b.call("add", vec![one, two]);
    assert_eq!(infer_ok(b, vec![add.clone()], call), Type::i32());

    let mut b = ProgramBuilder::new();
    let one = b.int(1);
    let call = b.call("add", vec![one]);
    assert_snapshot!(infer_err(b, vec![add.clone()], call), @"function 'add' expects 2 arguments, got 1");

    let mut b = ProgramBuilder::new();
    let s = b.string("a");
    let one = b.int(1);
    let call = b.call("add", vec![s, one]);
    assert_snapshot!(infer_err(b, vec![add], call), @"type mismatch: expected i32, got str in argument 'a' of 'add'");
}

#[test]
fn calling_a_value() {
    let mut b = ProgramBuilder::new();
    let call = b.call("count", Vec::new());
    assert_snapshot!(infer_err(b, channels(), call), @"'count' is not a function");
}

// ── Statement analysis ───────────────────────────────────────────

fn analyze_ok(program: &Program, globals: Vec<Symbol>) -> Analysis {
    let analysis = analyze(program, globals);
    assert!(analysis.is_ok(), "unexpected type errors: {:?}", analysis.errors);
    analysis
}

fn analyze_err(program: &Program, globals: Vec<Symbol>) -> String {
    let analysis = analyze(program, globals);
    assert!(!analysis.is_ok(), "expected type errors, got none");
    messages(&analysis.errors)
}

fn io_channels() -> Vec<Symbol> {
    vec![
        Symbol::channel("sensor", 1, Type::f32()),
        Symbol::channel("valve", 2, Type::u8()),
    ]
}

#[test]
fn control_task() {
    let mut b = ProgramBuilder::new();
    let sensor = b.ident("sensor");
    let read = b.decl("v", None, sensor);
    let v = b.ident("v");
    let limit = b.int(10);
    let cond = b.binary(v, BinaryOp::Gt, limit);
    let one = b.int(1);
    let open = b.write(one, "valve");
    let zero = b.int(0);
    let close = b.write(zero, "valve");
    let then = b.block(vec![open]);
    let otherwise = b.block(vec![close]);
    let branch = b.if_else(cond, then, Vec::new(), Some(otherwise));
    b.task("control").body(vec![read, branch]);
    let program = b.finish();

    let analysis = analyze_ok(&program, io_channels());
    let scope = analysis.function_scopes["control"];
    let v = analysis.scopes.resolve(scope, "v").unwrap();
    assert_eq!(v.ty, Type::f32());
    assert_eq!(v.kind, SymbolKind::Variable);
    assert_eq!(analysis.scope_of(read), Some(scope));
    assert!(!analysis.constraints.is_empty());
}

#[test]
fn stateful_variables_are_numbered_per_function() {
    let mut b = ProgramBuilder::new();
    let i64_ty = b.ty("i64");
    let zero = b.int(0);
    let count = b.stateful("count", Some(i64_ty), zero);
    let f64_ty = b.ty("f64");
    let zero_f = b.float(0.0);
    let total = b.stateful("total", Some(f64_ty), zero_f);
    let c = b.ident("count");
    let one = b.int(1);
    let next = b.binary(c, BinaryOp::Add, one);
    let bump = b.assign("count", next);
    b.task("tick").body(vec![count, total, bump]);
    let program = b.finish();

    let analysis = analyze_ok(&program, Vec::new());
    let scope = analysis.function_scopes["tick"];
    let count = analysis.scopes.resolve(scope, "count").unwrap();
    let total = analysis.scopes.resolve(scope, "total").unwrap();
    assert_eq!((count.kind, count.id), (SymbolKind::StatefulVariable, 0));
    assert_eq!((total.kind, total.id), (SymbolKind::StatefulVariable, 1));
}

#[test]
fn function_signatures_are_visible_before_bodies() {
    let mut b = ProgramBuilder::new();
    let two = b.float(2.0);
    let call = b.call("double", vec![two]);
    let ret = b.ret(Some(call));
    let f64_ty = b.ty("f64");
    b.func("caller").returns(f64_ty).body(vec![ret]);

    let f64_ty = b.ty("f64");
    let x_param = b.param("x", f64_ty);
    let x = b.ident("x");
    let two = b.float(2.0);
    let doubled = b.binary(x, BinaryOp::Mul, two);
    let ret = b.ret(Some(doubled));
    let f64_ty = b.ty("f64");
    b.func("double").input(x_param).returns(f64_ty).body(vec![ret]);
    let program = b.finish();

    let analysis = analyze_ok(&program, Vec::new());
    let sig = analysis.function("double").unwrap();
    assert_eq!(sig.inputs[0].ty, Type::f64());
    assert_eq!(sig.outputs[0].ty, Type::f64());
}

#[test]
fn literal_out_of_range_for_declared_type() {
    let mut b = ProgramBuilder::new();
    let i8_ty = b.ty("i8");
    let big = b.int(300);
    let decl = b.decl("x", Some(i8_ty), big);
    let u8_ty = b.ty("u8");
    let five = b.int(5);
    let neg = b.neg(five);
    let decl2 = b.decl("y", Some(u8_ty), neg);
    b.func("f").body(vec![decl, decl2]);
    let program = b.finish();
    assert_snapshot!(analyze_err(&program, Vec::new()), @r"
    value 300 out of range for i8 (must be in [-128, 127])
    value -5 out of range for u8 (must be in [0, 255])
    ");
}

#[test]
fn declared_type_mismatch() {
    let mut b = ProgramBuilder::new();
    let i32_ty = b.ty("i32");
    let s = b.string("hi");
    let decl = b.decl("x", Some(i32_ty), s);
    b.func("f").body(vec![decl]);
    let program = b.finish();
    assert_snapshot!(analyze_err(&program, Vec::new()), @"type mismatch: expected i32, got str in declaration of 'x'");
}

#[test]
fn invalid_assignment_targets() {
    let mut b = ProgramBuilder::new();
    let f64_ty = b.ty("f64");
    let default = b.float(1.5);
    let threshold = b.param_with_default("threshold", f64_ty, default);
    let two = b.float(2.0);
    let to_config = b.assign("threshold", two);
    let one = b.int(1);
    let to_channel = b.assign("sensor", one);
    let one = b.int(1);
    let to_nothing = b.assign("missing", one);
    b.task("t").config(threshold).body(vec![to_config, to_channel, to_nothing]);
    let program = b.finish();
    assert_snapshot!(analyze_err(&program, io_channels()), @r"
    cannot assign to config parameter 'threshold'
    cannot assign to channel 'sensor'
    undefined symbol 'missing'
    ");
}

#[test]
fn block_scopes_do_not_leak() {
    let mut b = ProgramBuilder::new();
    let cond = b.bool(true);
    let one = b.int(1);
    let inner = b.decl("y", None, one);
    let body = b.block(vec![inner]);
    let branch = b.if_else(cond, body, Vec::new(), None);
    let two = b.int(2);
    let after = b.assign("y", two);
    b.func("f").body(vec![branch, after]);
    let program = b.finish();
    assert_snapshot!(analyze_err(&program, Vec::new()), @"undefined symbol 'y'");
}

#[test]
fn shadowing_is_rejected() {
    let mut b = ProgramBuilder::new();
    let one = b.int(1);
    let outer = b.decl("x", None, one);
    let cond = b.bool(true);
    let two = b.int(2);
    let inner = b.decl("x", None, two);
    let body = b.block(vec![inner]);
    let c2 = b.bool(false);
    let three = b.int(3);
    let inner2 = b.decl("x", None, three);
    let elif = b.block(vec![inner2]);
    let branch = b.if_else(
        cond,
        body,
        vec![ElseIf {
            condition: c2,
            body: elif,
        }],
        None,
    );
    b.func("f").body(vec![outer, branch]);
    let program = b.finish();
    assert_snapshot!(analyze_err(&program, Vec::new()), @r"
    'x' is already declared
    'x' is already declared
    ");
}

#[test]
fn return_checks() {
    let mut b = ProgramBuilder::new();
    let missing = b.ret(None);
    let i32_ty = b.ty("i32");
    b.func("needs_value").returns(i32_ty).body(vec![missing]);

    let one = b.int(1);
    let extra = b.ret(Some(one));
    b.func("no_output").body(vec![extra]);

    let f32_ty = b.ty("f32");
    let x_param = b.param("x", f32_ty);
    let x = b.ident("x");
    let wrong = b.ret(Some(x));
    let i32_ty = b.ty("i32");
    b.func("wrong").input(x_param).returns(i32_ty).body(vec![wrong]);
    let program = b.finish();

    assert_snapshot!(analyze_err(&program, Vec::new()), @r"
    function 'needs_value' must return a value of type i32
    function 'no_output' does not return a value
    type mismatch: expected i32, got f32 in return value of 'wrong'
    ");
}

#[test]
fn narrowing_return_is_accepted() {
    let mut b = ProgramBuilder::new();
    let i64_ty = b.ty("i64");
    let x_param = b.param("x", i64_ty);
    let x = b.ident("x");
    let ret = b.ret(Some(x));
    let i32_ty = b.ty("i32");
    b.func("narrow").input(x_param).returns(i32_ty).body(vec![ret]);
    let program = b.finish();
    analyze_ok(&program, Vec::new());
}

#[test]
fn channel_statements() {
    let mut b = ProgramBuilder::new();
    let read = b.read("v", "sensor", true);
    let v = b.ident("v");
    let to_var = b.write(v, "v");
    let s = b.string("open");
    let bad_value = b.write(s, "valve");
    b.task("t").body(vec![read, to_var, bad_value]);
    let program = b.finish();
    assert_snapshot!(analyze_err(&program, io_channels()), @r"
    'v' is not a channel
    type mismatch: expected u8, got str in write to channel 'valve'
    ");
}

#[test]
fn channels_used_as_values_read_their_element() {
    let mut b = ProgramBuilder::new();
    let sensor = b.ident("sensor");
    let ret = b.ret(Some(sensor));
    let f32_ty = b.ty("f32");
    b.func("latest").returns(f32_ty).body(vec![ret]);

    let f32_ty = b.ty("f32");
    let sensor = b.ident("sensor");
    let decl = b.decl("v", Some(f32_ty), sensor);
    let sensor = b.ident("sensor");
    let forward = b.write(sensor, "mirror");
    b.task("copy").body(vec![decl, forward]);
    let program = b.finish();

    let mut globals = io_channels();
    globals.push(Symbol::channel("mirror", 3, Type::f32()));
    analyze_ok(&program, globals);
}

#[test]
fn named_outputs_are_assignable() {
    let mut b = ProgramBuilder::new();
    let f64_ty = b.ty("f64");
    let hi = b.param("high", f64_ty);
    let f64_ty = b.ty("f64");
    let lo = b.param("low", f64_ty);
    let one = b.float(1.0);
    let set_hi = b.assign("high", one);
    let zero = b.float(0.0);
    let set_lo = b.assign("low", zero);
    b.task("split").output(hi).output(lo).body(vec![set_hi, set_lo]);
    let program = b.finish();

    let analysis = analyze_ok(&program, Vec::new());
    let scope = analysis.function_scopes["split"];
    let low = analysis.scopes.resolve(scope, "low").unwrap();
    assert_eq!((low.kind, low.id), (SymbolKind::Output, 1));
}

#[test]
fn config_defaults() {
    let mut b = ProgramBuilder::new();
    let f64_ty = b.ty("f64");
    let gain = b.param("gain", f64_ty);
    let f64_ty = b.ty("f64");
    let x_param = b.param("x", f64_ty);
    let x = b.ident("x");
    let g = b.ident("gain");
    let scaled = b.binary(x, BinaryOp::Mul, g);
    let ret = b.ret(Some(scaled));
    let f64_ty = b.ty("f64");
    b.func("scale").config(gain).input(x_param).returns(f64_ty).body(vec![ret]);

    let one = b.float(1.0);
    let call = b.call("scale", vec![one]);
    let stmt = b.expr_stmt(call);
    b.task("user").body(vec![stmt]);

    let f64_ty = b.ty("f64");
    let other = b.ident("gain");
    let bad_default = b.param_with_default("offset", f64_ty, other);
    b.func("broken").config(bad_default).body(Vec::new());
    let program = b.finish();

    assert_snapshot!(analyze_err(&program, Vec::new()), @r"
    default value of 'offset' must be a literal
    config parameter 'gain' of 'scale' has no default
    ");
}

#[test]
fn config_default_is_parsed_against_its_type() {
    let mut b = ProgramBuilder::new();
    let u16_ty = b.ty("u16");
    let default = b.int(500);
    let period = b.param_with_default("period", u16_ty, default);
    b.task("t").config(period).body(Vec::new());
    let program = b.finish();

    let analysis = analyze_ok(&program, Vec::new());
    let sig = analysis.function("t").unwrap();
    assert_eq!(sig.config[0].default, Some(Value::Uint(500)));
}

#[test]
fn unknown_types_in_declarations() {
    let mut b = ProgramBuilder::new();
    let bogus = b.ty("quaternion");
    let one = b.int(1);
    let decl = b.decl("q", Some(bogus), one);
    let chan_inner = b.ty("f32");
    let chan = b.chan_ty(chan_inner);
    let series = b.series_ty(chan);
    let s = b.ident("q");
    let decl2 = b.decl("s", Some(series), s);
    b.func("f").body(vec![decl, decl2]);
    let program = b.finish();
    assert_snapshot!(analyze_err(&program, Vec::new()), @r"
    unknown type: quaternion
    series must have primitive type, got chan f32
    ");
}

#[test]
fn every_expression_gets_a_type() {
    let mut b = ProgramBuilder::new();
    let sensor = b.ident("sensor");
    let half = b.float(0.5);
    let scaled = b.binary(sensor, BinaryOp::Mul, half);
    let decl = b.decl("v", None, scaled);
    b.task("t").body(vec![decl]);
    let program = b.finish();

    let analysis = analyze_ok(&program, io_channels());
    assert_eq!(analysis.type_of(scaled), Some(&Type::f32()));
}
