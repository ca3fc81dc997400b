//! Settings export/import compatibility for every built-in plugin.

use proptest::prelude::*;
use textpipe::builtin::MemoryInput;
use textpipe::plugins::{InputPlugin, Plugin, PluginRegistry, SETTINGS_VERSION_KEY};
use textpipe::{PipelineConfig, RawItem, Settings, StageConfig, TextpipeError};

fn settings(pairs: &[(&str, String)]) -> Settings {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Import, export, import into a fresh instance, export again: both exports
/// match, with and without suppressed warnings.
fn assert_round_trip(plugin: &str, imported: &Settings) -> Result<(), TestCaseError> {
    let registry = PluginRegistry::new();
    let first = registry.create(plugin).unwrap();
    first.plugin().import_settings(imported).unwrap();
    let quiet = first.plugin().export_settings(true);
    prop_assert_eq!(&first.plugin().export_settings(false), &quiet);

    for suppress_warnings in [false, true] {
        let exported = first.plugin().export_settings(suppress_warnings);
        let second = registry.create(plugin).unwrap();
        second.plugin().import_settings(&exported).unwrap();
        prop_assert_eq!(second.plugin().export_settings(suppress_warnings), exported);
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_segmenter_round_trip(words in 1usize..100_000) {
        assert_round_trip("segmenter", &settings(&[("words_per_segment", words.to_string())]))?;
    }

    #[test]
    fn prop_tokenizer_round_trip(min_length in 0usize..64) {
        assert_round_trip("tokenizer", &settings(&[("min_length", min_length.to_string())]))?;
    }

    #[test]
    fn prop_word_count_round_trip(emit_totals in any::<bool>()) {
        assert_round_trip("word-count", &settings(&[("emit_totals", emit_totals.to_string())]))?;
    }

    #[test]
    fn prop_csv_output_round_trip(
        location in "[a-z]{1,12}\\.csv",
        append in any::<bool>(),
        delimiter in prop::sample::select(vec![',', ';', '\t', '|']),
        include_header in any::<bool>(),
    ) {
        let mode = if append { "append" } else { "truncate" };
        assert_round_trip(
            "csv-output",
            &settings(&[
                ("location", location),
                ("mode", mode.to_string()),
                ("delimiter", delimiter.to_string()),
                ("include_header", include_header.to_string()),
            ]),
        )?;
    }

    #[test]
    fn prop_memory_input_round_trip(texts in prop::collection::vec("[a-z ]{1,20}", 1..8)) {
        assert_round_trip("memory-input", &settings(&[("texts", texts.join("|"))]))?;
    }

    #[test]
    fn prop_memory_input_keeps_items(
        items in prop::collection::vec(("[a-z]{1,8}\\.txt", "[a-z |\\\\;]{0,20}"), 1..8),
    ) {
        let expected: Vec<RawItem> = items.iter().map(|(o, t)| RawItem::new(o.as_str(), t.as_str())).collect();
        let input = MemoryInput::from_items(expected.clone());

        for suppress_warnings in [false, true] {
            let copy = MemoryInput::new();
            copy.import_settings(&input.export_settings(suppress_warnings)).unwrap();
            let restored: Vec<RawItem> = copy.enumerate().unwrap().map(|r| r.unwrap()).collect();
            prop_assert_eq!(&restored, &expected);
        }
    }
}

#[test]
fn test_every_builtin_ignores_unknown_keys() {
    let registry = PluginRegistry::new();
    for name in registry.list() {
        let stage = registry.create(&name).unwrap();
        let result = stage
            .plugin()
            .import_settings(&settings(&[("from_a_future_release", "1".to_string())]));
        assert!(result.is_ok(), "{} rejected an unknown key: {:?}", name, result);
    }
}

#[test]
fn test_every_builtin_rejects_newer_settings_version() {
    let registry = PluginRegistry::new();
    for name in registry.list() {
        let stage = registry.create(&name).unwrap();
        let result = stage
            .plugin()
            .import_settings(&settings(&[(SETTINGS_VERSION_KEY, "999".to_string())]));
        assert!(
            matches!(result, Err(TextpipeError::Settings { .. })),
            "{} accepted a newer settings version",
            name
        );
    }
}

#[test]
fn test_every_builtin_exports_settings_version() {
    let registry = PluginRegistry::new();
    for name in registry.list() {
        let stage = registry.create(&name).unwrap();
        let exported = stage.plugin().export_settings(true);
        assert!(exported.contains_key(SETTINGS_VERSION_KEY), "{} exported no version", name);
    }
}

#[test]
fn test_missing_keys_fall_back_to_defaults() {
    let registry = PluginRegistry::new();
    let stage = registry.create("segmenter").unwrap();
    stage.plugin().import_settings(&Settings::new()).unwrap();
    let exported = stage.plugin().export_settings(true);
    assert_eq!(exported.get("words_per_segment").map(String::as_str), Some("100"));
}

#[test]
fn test_whole_pipeline_config_round_trip() {
    let registry = PluginRegistry::new();
    let config = PipelineConfig {
        engine: Default::default(),
        input: StageConfig::new("memory-input").with("texts", "a b|c"),
        linear: vec![
            StageConfig::new("segmenter").with("words_per_segment", "7"),
            StageConfig::new("word-count").with("emit_totals", "true"),
        ],
        output: StageConfig::new("csv-output")
            .with("location", "out.csv")
            .with("delimiter", ";"),
    };

    let built = registry.build_pipeline(&config).unwrap();
    for suppress_warnings in [false, true] {
        let exported = built.export_config(suppress_warnings);
        let rebuilt = registry.build_pipeline(&exported).unwrap().export_config(suppress_warnings);
        assert_eq!(rebuilt, exported);
        assert_eq!(
            exported.linear[0].settings.get("words_per_segment").map(String::as_str),
            Some("7")
        );
    }
}
