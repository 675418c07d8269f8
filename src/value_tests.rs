//! Tests for configuration values.

use std::time::Duration;

use super::*;

fn map(entries: &[(&str, Value)]) -> Map {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

mod conversions {
    use super::*;

    #[test]
    fn json_numbers_keep_integer_and_float_apart() {
        let value = Value::from(serde_json::json!({"a": 1, "b": 1.5, "c": [true, null]}));

        assert_eq!(value.lookup("a"), Some(&Value::Int(1)));
        assert_eq!(value.lookup("b"), Some(&Value::Float(1.5)));
        assert_eq!(
            value.lookup("c"),
            Some(&Value::List(vec![Value::Bool(true), Value::Null]))
        );
    }

    #[test]
    fn yaml_non_string_keys_are_stringified() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("1: one\ntrue: yes\nname: x").unwrap();
        let value = Value::from(yaml);

        assert_eq!(value.lookup("1"), Some(&Value::from("one")));
        assert_eq!(value.lookup("true"), Some(&Value::from("yes")));
        assert_eq!(value.lookup("name"), Some(&Value::from("x")));
    }

    #[test]
    fn toml_datetime_becomes_string() {
        let toml: toml::Value = toml::from_str("at = 1979-05-27T07:32:00Z").unwrap();
        let value = Value::from(toml);

        assert_eq!(value.lookup("at"), Some(&Value::from("1979-05-27T07:32:00Z")));
    }

    #[test]
    fn to_json_maps_non_finite_floats_to_null() {
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(Value::Float(2.5).to_json(), serde_json::json!(2.5));
    }

    #[test]
    fn display_prints_strings_raw_and_others_as_json() {
        assert_eq!(Value::from("info").to_string(), "info");
        assert_eq!(Value::from(vec!["a", "b"]).to_string(), r#"["a","b"]"#);
        assert_eq!(Value::Int(3).to_string(), "3");
    }
}

mod coercion {
    use super::*;

    #[test]
    fn bool_accepts_common_spellings() {
        assert_eq!(Value::from("TRUE").as_bool(), Some(true));
        assert_eq!(Value::from("0").as_bool(), Some(false));
        assert_eq!(Value::Int(2).as_bool(), Some(true));
        assert_eq!(Value::from("maybe").as_bool(), None);
    }

    #[test]
    fn integer_from_whole_float_and_string() {
        assert_eq!(Value::Float(4.0).as_i64(), Some(4));
        assert_eq!(Value::Float(4.5).as_i64(), None);
        assert_eq!(Value::from(" 42 ").as_i64(), Some(42));
    }

    #[test]
    fn strings_from_list_and_single_string() {
        assert_eq!(
            Value::from(vec![Value::from("a"), Value::Int(1)]).as_strings(),
            Some(vec!["a".to_string(), "1".to_string()])
        );
        assert_eq!(Value::from("solo").as_strings(), Some(vec!["solo".to_string()]));
        assert_eq!(Value::from("").as_strings(), Some(vec![]));
        assert_eq!(Value::Bool(true).as_strings(), None);
    }

    #[test]
    fn duration_from_numbers_are_seconds() {
        assert_eq!(Value::Int(30).as_duration(), Some(Duration::from_secs(30)));
        assert_eq!(Value::Float(0.5).as_duration(), Some(Duration::from_millis(500)));
        assert_eq!(Value::Int(-1).as_duration(), None);
    }

    #[test]
    fn duration_strings_with_units() {
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("10 parsecs"), None);
        assert_eq!(parse_duration("ms"), None);
        assert_eq!(parse_duration(""), None);
    }
}

mod tree {
    use super::*;

    #[test]
    fn lookup_walks_nested_maps() {
        let value = Value::Map(map(&[(
            "a",
            Value::Map(map(&[("b", Value::Int(1))])),
        )]));

        assert_eq!(value.lookup("a.b"), Some(&Value::Int(1)));
        assert_eq!(value.lookup("a.b.c"), None);
        assert_eq!(value.lookup("x"), None);
        assert_eq!(value.lookup(""), Some(&value));
    }

    #[test]
    fn merge_is_key_by_key_for_maps() {
        let mut base = Value::Map(map(&[(
            "a",
            Value::Map(map(&[("b", Value::Int(1)), ("c", Value::Int(2))])),
        )]));
        let overlay = Value::Map(map(&[(
            "a",
            Value::Map(map(&[("b", Value::Int(9))])),
        )]));

        base.merge(overlay);

        assert_eq!(base.lookup("a.b"), Some(&Value::Int(9)));
        assert_eq!(base.lookup("a.c"), Some(&Value::Int(2)));
    }

    #[test]
    fn merge_replaces_lists_wholesale() {
        let mut base = Value::from(vec!["a", "b"]);
        base.merge(Value::from(vec!["c"]));

        assert_eq!(base, Value::from(vec!["c"]));
    }

    #[test]
    fn insert_path_creates_and_replaces_intermediates() {
        let mut root = map(&[("a", Value::Int(1))]);

        insert_path(&mut root, "a.b.c", Value::Bool(true));
        insert_path(&mut root, "", Value::Bool(false));

        let value = Value::Map(root);
        assert_eq!(value.lookup("a.b.c"), Some(&Value::Bool(true)));
    }

    #[test]
    fn leaf_paths_are_sorted_and_dotted() {
        let mut root = Map::new();
        insert_path(&mut root, "z", Value::Int(1));
        insert_path(&mut root, "a.y", Value::Int(2));
        insert_path(&mut root, "a.x", Value::Int(3));

        let mut paths = Vec::new();
        leaf_paths(&root, "", &mut paths);

        assert_eq!(paths, vec!["a.x", "a.y", "z"]);
    }
}
