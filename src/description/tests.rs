use super::*;
use geo::{MultiPolygon, polygon};
use std::collections::BTreeMap;

fn ward(name: Option<&str>, attributes: &[(&str, &str)]) -> Ward {
    Ward {
        id: "12".to_string(),
        name: name.map(str::to_string),
        geometry: MultiPolygon::new(vec![polygon![
            (x: 77.0, y: 28.0),
            (x: 77.1, y: 28.0),
            (x: 77.1, y: 28.1),
        ]]),
        attributes: attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[test]
fn plain_description() {
    let text = describe_ward(&ward(Some("Chandni Chowk"), &[]), "Delhi").expect("describe");
    assert_eq!(
        text,
        "This is municipal ward number 12, named Chandni Chowk, in Delhi."
    );
}

#[test]
fn attributes_in_key_order() {
    let text = describe_ward(
        &ward(Some("Chandni Chowk"), &[("zone", "City SP"), ("ac_name", "Chandni Chowk")]),
        "Delhi",
    )
    .expect("describe");

    assert_eq!(
        text,
        "This is municipal ward number 12, named Chandni Chowk, in Delhi. \
         Attributes: ac_name: Chandni Chowk; zone: City SP."
    );
}

#[test]
fn description_is_deterministic() {
    let w = ward(Some("Karol Bagh"), &[("b", "2"), ("a", "1")]);
    assert_eq!(
        describe_ward(&w, "Delhi").expect("first"),
        describe_ward(&w, "Delhi").expect("second")
    );
}

#[test]
fn missing_name_is_incomplete() {
    match describe_ward(&ward(None, &[]), "Delhi") {
        Err(WardError::IncompleteRecord { ward_id, field }) => {
            assert_eq!(ward_id, "12");
            assert_eq!(field, "name");
        }
        other => panic!("expected incomplete record, got {:?}", other),
    }
}

#[test]
fn blank_name_is_incomplete() {
    assert!(matches!(
        describe_ward(&ward(Some("  "), &[]), "Delhi"),
        Err(WardError::IncompleteRecord { .. })
    ));
}
