use unitree::prelude::*;


#[test]
fn kind_from_flags() {
    let cases = [
        (true, false, VariableKind::Ordered),
        (true, true, VariableKind::Numeric),
        (false, false, VariableKind::Factor),
        (false, true, VariableKind::Ordered),
    ];
    for (numeric, multi_category, exp) in cases {
        let res = VariableKind::classify(numeric, multi_category);
        assert_eq!(exp, res, "expected {exp:?}, got {res:?}.");
    }
}


#[test]
fn descriptors_from_metadata() {
    let raws = vec![
        RawVariable::new("age", true, true),
        RawVariable::new("grade", true, false).levels(["low", "high"]),
        RawVariable::new("color", false, false).levels(["red", "blue"]),
    ];
    let descriptors = unitree::variable::describe_variables(&raws).unwrap();

    let kinds = descriptors.iter()
        .map(|d| d.kind())
        .collect::<Vec<_>>();
    let exp = vec![VariableKind::Numeric, VariableKind::Ordered, VariableKind::Factor];
    assert_eq!(exp, kinds, "expected {exp:?}, got {kinds:?}.");

    assert_eq!(descriptors[0].cardinality(), 0);
    assert_eq!(descriptors[2].cardinality(), 2);
    assert_eq!(descriptors[2].code_of("blue"), Some(1));
    assert_eq!(descriptors[1].level_name(0), "low");
}


#[test]
fn duplicated_names() {
    let raws = vec![
        RawVariable::new("x", true, true),
        RawVariable::new("x", true, true),
    ];
    let err = unitree::variable::describe_variables(&raws).unwrap_err();
    match err {
        ForestError::Schema { location, .. } => {
            let exp = Location::Variable { index: 1, name: "x".to_string() };
            assert_eq!(exp, location, "expected {exp:?}, got {location:?}.");
        },
        other => panic!("expected a schema error, got {other:?}"),
    }
}


#[test]
fn factor_without_levels() {
    let raw = RawVariable::new("color", false, false);
    assert!(VariableDescriptor::from_raw(0, &raw).is_err());
}
