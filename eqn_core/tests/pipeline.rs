//! End-to-end tests through the public API: source text in, merged result out.

use std::cell::RefCell;
use std::collections::BTreeMap;

use approx::assert_relative_eq;
use eqn_core::{preprocess, EqnError, Preprocessor, ResolvedSystem, SolveRequest, SolverAdapter, SolverConfig, UnitTable};

type Reply = Result<BTreeMap<String, f64>, String>;

const PROJECTILE: &str = "\
Projectile launched from a ledge

g: 32.174
v0: 20 [m/s->ft/s]
h0: 5 [m->ft]

guess 1.5 for t
keep t on [0, 100]

0 = h0 + v0*t - g*t^2/2
";

#[test]
fn projectile_system_is_solver_ready() {
    let units = UnitTable::bundled().unwrap();
    let system = preprocess(PROJECTILE, &units).unwrap();

    assert_eq!(system.equations.len(), 1);
    assert_eq!(system.variables, vec!["t"]);
    assert_eq!(system.guesses["t"], 1.5);
    assert_eq!(system.bounds["t"].as_array(), [0.0, 100.0]);
    assert_eq!(system.degrees_of_freedom(), 0);

    let equation = &system.equations[0];
    assert!(!equation.contains('['));
    for name in ["g", "v0", "h0"] {
        assert!(!equation.contains(name), "{} left in {}", name, equation);
    }

    assert_relative_eq!(system.parameter("h0").unwrap().value, 16.404199475065617, max_relative = 1e-12);
}

#[test]
fn closure_solver_sees_request_and_result_is_merged() {
    let units = UnitTable::bundled().unwrap();
    let system = preprocess(PROJECTILE, &units).unwrap();

    let seen = RefCell::new(None::<SolveRequest>);
    let solver = |request: &SolveRequest| -> Reply {
        *seen.borrow_mut() = Some(request.clone());
        Ok(BTreeMap::from([("t".to_string(), 4.3125)]))
    };
    let result = SolverAdapter::new(solver, SolverConfig::default())
        .invoke(&system)
        .unwrap();

    let request = seen.borrow().clone().unwrap();
    assert_eq!(request.tolerance, 1e-5);
    assert_eq!(request.iteration_limit, 300);
    assert_eq!(request.bounds["t"], [0.0, 100.0]);

    let names: Vec<&str> = result.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["g", "h0", "t", "v0"]);
    assert_eq!(result["t"], 4.3125);
}

#[test]
fn two_equation_system_defaults_guesses() {
    let units = UnitTable::bundled().unwrap();
    let source = "P: 100 [psi->kPa]\nA: 2\nF = P*A\nF = k*d\nguess 0.5 for d";
    let system = Preprocessor::new(&units).preprocess(source).unwrap();

    assert_eq!(system.variables, vec!["F", "k", "d"]);
    assert_eq!(
        system.guesses,
        BTreeMap::from([("F".to_string(), 1.0), ("d".to_string(), 0.5), ("k".to_string(), 1.0)])
    );
    assert_relative_eq!(system.parameter("P").unwrap().value, 689.4757293168361, max_relative = 1e-9);
    assert_eq!(system.degrees_of_freedom(), 1);
}

#[test]
fn resolved_system_serializes_for_inspection() {
    let units = UnitTable::bundled().unwrap();
    let system = preprocess("a: 2\nguess 3 for x\nx*a = 8", &units).unwrap();

    let json = serde_json::to_value(&system).unwrap();
    assert_eq!(json["equations"], serde_json::json!(["x*(2) = 8"]));
    assert_eq!(json["parameters"][0]["name"], "a");

    let back: ResolvedSystem = serde_json::from_value(json).unwrap();
    assert_eq!(back, system);
}

#[test]
fn failures_surface_with_codes() {
    let units = UnitTable::bundled().unwrap();
    let cases = [
        ("x = 3 [m->s]", "UNIT_NOT_FOUND"),
        ("a: b + 1\nx = a", "PARAMETER_EVAL"),
        ("a: 1\na: 2\nx = a", "NAME_CONFLICT"),
        ("guess x for 5\nx = 1", "MALFORMED_DIRECTIVE"),
        ("keep x on [5, 1]\nx = 1", "MALFORMED_DIRECTIVE"),
        ("x = = 1", "MALFORMED_EQUATION"),
        ("y = 2x", "MALFORMED_EQUATION"),
        ("x: 3\nx = 5", "NAME_CONFLICT"),
    ];
    for (source, code) in cases {
        let err = preprocess(source, &units).unwrap_err();
        assert!(matches!(err, EqnError::Preprocess(_)), "{}", source);
        assert_eq!(err.error_code(), code, "{}", source);
    }
}

#[test]
fn error_json_is_tagged() {
    let units = UnitTable::bundled().unwrap();
    let err = preprocess("x = 1 [furlong->m]", &units).unwrap_err();
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["type"], "Preprocess");
    assert_eq!(json["details"]["type"], "UnitNotFound");
    assert_eq!(json["details"]["details"]["from"], "furlong");
}
