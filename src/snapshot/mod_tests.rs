//! Tests for snapshot building and the live holder.

use super::*;
use crate::layer::{FlagSet, LayerKind};

fn layer(name: &str, pairs: &[(&str, Value)]) -> Layer {
    pairs
        .iter()
        .fold(Layer::new(name, LayerKind::File), |layer, (path, value)| {
            layer.with(path, value.clone())
        })
}

mod build {
    use super::*;

    #[test]
    fn highest_layer_defining_a_key_wins() {
        let layers = [
            layer("defaults", &[("log.level", Value::from("info"))]),
            layer("a.yaml", &[("log.level", Value::from("warn"))]),
            layer("b.yaml", &[("port", Value::Int(1))]),
            layer("flags", &[("log.level", Value::from("debug"))]),
        ];

        let snapshot = Snapshot::build(&layers);

        assert_eq!(snapshot.get("log.level"), Some(&Value::from("debug")));
        assert_eq!(snapshot.get("port"), Some(&Value::Int(1)));
    }

    #[test]
    fn nested_merge_keeps_siblings() {
        let layers = [
            layer(
                "file",
                &[("a.b", Value::Int(1)), ("a.c", Value::Int(2))],
            ),
            layer("flags", &[("a.b", Value::Int(9))]),
        ];

        let snapshot = Snapshot::build(&layers);

        assert_eq!(snapshot.get("a.b"), Some(&Value::Int(9)));
        assert_eq!(snapshot.get("a.c"), Some(&Value::Int(2)));
    }

    #[test]
    fn lists_are_replaced_wholesale() {
        let layers = [
            layer("file", &[("hosts", Value::from(vec!["a", "b"]))]),
            layer("env", &[("hosts", Value::from(vec!["c"]))]),
        ];

        let snapshot = Snapshot::build(&layers);

        assert_eq!(snapshot.get("hosts"), Some(&Value::from(vec!["c"])));
    }

    #[test]
    fn marshaling_is_deterministic() {
        let layers = [
            layer("x", &[("z", Value::Int(1)), ("a.y", Value::Bool(true))]),
            layer("y", &[("m", Value::from("s"))]),
        ];

        let first = Snapshot::build(&layers).to_json_bytes();
        let second = Snapshot::build(&layers).to_json_bytes();

        assert_eq!(first, second);
        assert_eq!(
            String::from_utf8(first).unwrap(),
            r#"{"a":{"y":true},"m":"s","z":1}"#
        );
    }
}

mod lookup {
    use super::*;

    #[test]
    fn nulls_are_absent() {
        let snapshot = Snapshot::build(&[layer(
            "f",
            &[("a", Value::Null), ("b", Value::Int(1))],
        )]);

        assert!(!snapshot.exists("a"));
        assert!(snapshot.exists("b"));
        assert_eq!(snapshot.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn override_returns_new_snapshot() {
        let original = Snapshot::build(&[layer("f", &[("a.b", Value::Int(1))])]);

        let changed = original.with_override("a.c", Value::Int(2));

        assert_eq!(original.get("a.c"), None);
        assert_eq!(changed.get("a.b"), Some(&Value::Int(1)));
        assert_eq!(changed.get("a.c"), Some(&Value::Int(2)));
    }

    #[test]
    fn empty_path_is_absent() {
        assert_eq!(Snapshot::default().get(""), None);
    }
}

mod pipeline {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    use crate::layer::{SchemaPath, SchemaType};

    #[test]
    fn sources_apply_in_precedence_order() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.yaml");
        std::fs::write(&file, "log:\n  level: warn\n  format: json\nport: 1\n").unwrap();

        let defaults = Layer::new("defaults", LayerKind::Defaults)
            .with("log.level", "info")
            .with("timeout", 5_i64);
        let flags = FlagSet::new()
            .with_changed("port", "2")
            .with_default("timeout", "30");
        let env: HashMap<String, String> =
            [("APP_LOG_LEVEL".to_string(), "debug".to_string())].into();
        let paths = vec![SchemaPath {
            path: "log.level".to_string(),
            kind: SchemaType::String,
        }];

        let pipeline = Pipeline::new(defaults, paths, vec![file], flags, "APP_", Arc::new(env));
        let snapshot = pipeline.build().unwrap();

        assert_eq!(snapshot.get("log.level"), Some(&Value::from("debug")));
        assert_eq!(snapshot.get("log.format"), Some(&Value::from("json")));
        assert_eq!(snapshot.get("port"), Some(&Value::Int(2)));
        assert_eq!(snapshot.get("timeout"), Some(&Value::Int(5)));
    }

    #[test]
    fn files_are_reread_on_each_build() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.json");
        std::fs::write(&file, r#"{"a": 1}"#).unwrap();
        let pipeline = Pipeline::new(
            Layer::new("defaults", LayerKind::Defaults),
            Vec::new(),
            vec![file.clone()],
            FlagSet::new(),
            "",
            Arc::new(HashMap::<String, String>::new()),
        );

        assert_eq!(pipeline.build().unwrap().get("a"), Some(&Value::Int(1)));
        std::fs::write(&file, r#"{"a": 2}"#).unwrap();
        assert_eq!(pipeline.build().unwrap().get("a"), Some(&Value::Int(2)));
    }

    #[test]
    fn missing_file_fails_the_build() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            Layer::new("defaults", LayerKind::Defaults),
            Vec::new(),
            vec![dir.path().join("gone.yaml")],
            FlagSet::new(),
            "",
            Arc::new(HashMap::<String, String>::new()),
        );

        assert!(pipeline.build().is_err());
    }
}

mod live {
    use super::*;

    fn snapshot(value: i64) -> Snapshot {
        Snapshot::build(&[layer("f", &[("v", Value::Int(value))])])
    }

    #[test]
    fn accepted_candidate_is_stored() {
        let live = LiveSnapshot::new(snapshot(1));

        let result = live.commit(snapshot(2), || false, |_, _| Ok::<(), ()>(()));

        assert!(matches!(result, Commit::Applied));
        assert_eq!(live.load().get("v"), Some(&Value::Int(2)));
    }

    #[test]
    fn rejected_candidate_keeps_live() {
        let live = LiveSnapshot::new(snapshot(1));

        let result = live.commit(snapshot(2), || false, |old, new| {
            assert_eq!(old.get("v"), Some(&Value::Int(1)));
            assert_eq!(new.get("v"), Some(&Value::Int(2)));
            Err("nope")
        });

        assert!(matches!(result, Commit::Rejected("nope")));
        assert_eq!(live.load().get("v"), Some(&Value::Int(1)));
    }

    #[test]
    fn cancelled_commit_changes_nothing() {
        let live = LiveSnapshot::new(snapshot(1));

        let result = live.commit(snapshot(2), || true, |_, _| Ok::<(), ()>(()));

        assert!(matches!(result, Commit::Cancelled));
        assert_eq!(live.load().get("v"), Some(&Value::Int(1)));
    }

    #[test]
    fn readers_keep_their_snapshot_across_commits() {
        let live = LiveSnapshot::new(snapshot(1));
        let held = live.load();

        live.try_update(|s| Ok::<_, ()>(s.with_override("v", Value::Int(3))))
            .unwrap();

        assert_eq!(held.get("v"), Some(&Value::Int(1)));
        assert_eq!(live.load().get("v"), Some(&Value::Int(3)));
    }

    #[test]
    fn failed_update_keeps_live() {
        let live = LiveSnapshot::new(snapshot(1));

        let result = live.try_update(|s| {
            assert_eq!(s.get("v"), Some(&Value::Int(1)));
            Err("refused")
        });

        assert_eq!(result, Err("refused"));
        assert_eq!(live.load().get("v"), Some(&Value::Int(1)));
    }
}

mod typed {
    use super::*;

    use std::time::Duration;

    fn sample() -> Snapshot {
        Snapshot::build(&[layer(
            "f",
            &[
                ("port", Value::Int(8080)),
                ("debug", Value::Bool(true)),
                ("ratio", Value::Float(0.5)),
                ("timeout", Value::String("1m30s".into())),
                (
                    "hosts",
                    Value::List(vec![Value::String("a".into()), Value::String("b".into())]),
                ),
            ],
        )])
    }

    #[test]
    fn getters_convert_present_values() {
        let s = sample();

        assert_eq!(s.int("port"), 8080);
        assert_eq!(s.string("port"), "8080");
        assert!(s.bool("debug"));
        assert!((s.float64("ratio") - 0.5).abs() < f64::EPSILON);
        assert_eq!(s.duration("timeout"), Duration::from_secs(90));
        assert_eq!(s.strings("hosts"), vec!["a", "b"]);
    }

    #[test]
    fn fallbacks_cover_missing_keys() {
        let s = sample();

        assert_eq!(s.int_f("missing", 7), 7);
        assert_eq!(s.string_f("missing", "x"), "x");
        assert!(s.bool_f("missing", true));
        assert_eq!(s.duration_f("missing", Duration::from_secs(3)), Duration::from_secs(3));
        assert_eq!(s.unmarshal_f("missing", 5_u16), 5);
        assert_eq!(s.unmarshal_f("port", 5_u16), 8080);
    }
}
