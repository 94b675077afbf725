use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::LangMap;

/// What reading a source file produced.
#[derive(Debug)]
pub enum SourceState {
    Mapping(LangMap),
    /// Valid JSON, but not a key/value object.
    NotAMapping,
}

/// How the target state was obtained. Anything other than `Loaded` or
/// `Absent` means the persisted file was replaced by an empty mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRepair {
    Loaded,
    Absent,
    ResetFromList,
    ResetFromOtherShape,
    ResetUnreadable,
}

#[derive(Debug)]
pub struct TargetState {
    pub mapping: LangMap,
    pub repair: TargetRepair,
}

/// Outstanding work for one locale collection.
#[derive(Debug)]
pub struct PairDiff {
    pub outstanding: LangMap,
    pub target: TargetState,
}

/// Errors here (missing file, invalid JSON) make the pair skippable.
pub fn load_source(path: &Path) -> Result<SourceState> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read source: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse source: {}", path.display()))?;
    Ok(match value {
        Value::Object(map) => SourceState::Mapping(map),
        _ => SourceState::NotAMapping,
    })
}

/// Never fails: a damaged target is treated as empty.
pub fn load_target(path: &Path) -> TargetState {
    if !path.exists() {
        return TargetState {
            mapping: LangMap::new(),
            repair: TargetRepair::Absent,
        };
    }
    let parsed = fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<Value>(&content).ok());
    let (mapping, repair) = match parsed {
        Some(Value::Object(map)) => (map, TargetRepair::Loaded),
        Some(Value::Array(_)) => (LangMap::new(), TargetRepair::ResetFromList),
        Some(_) => (LangMap::new(), TargetRepair::ResetFromOtherShape),
        None => (LangMap::new(), TargetRepair::ResetUnreadable),
    };
    TargetState { mapping, repair }
}

/// Source entries whose key is absent from the target, in source order.
pub fn outstanding(source: &LangMap, target: &LangMap) -> LangMap {
    source
        .iter()
        .filter(|(key, _)| !target.contains_key(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Returns `Ok(None)` when the source is not a key/value mapping.
pub fn diff_pair(source_path: &Path, target_path: &Path) -> Result<Option<PairDiff>> {
    let SourceState::Mapping(source) = load_source(source_path)? else {
        return Ok(None);
    };
    let target = load_target(target_path);
    let outstanding = outstanding(&source, &target.mapping);
    Ok(Some(PairDiff {
        outstanding,
        target,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn map(value: Value) -> LangMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn outstanding_keeps_source_order_and_skips_present_keys() {
        let source = map(json!({"c": "C", "a": "A", "b": "B", "d": "D"}));
        let target = map(json!({"a": "あ", "d": ""}));
        let result = outstanding(&source, &target);
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["c", "b"]);
    }

    #[test]
    fn absent_target_is_empty() {
        let dir = tempdir().unwrap();
        let state = load_target(&dir.path().join("ja_jp.json"));
        assert!(state.mapping.is_empty());
        assert_eq!(state.repair, TargetRepair::Absent);
    }

    #[test]
    fn list_target_is_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ja_jp.json");
        fs::write(&path, r#"[{"key": "a", "value": "あ"}]"#).unwrap();
        let state = load_target(&path);
        assert!(state.mapping.is_empty());
        assert_eq!(state.repair, TargetRepair::ResetFromList);
    }

    #[test]
    fn unparsable_or_scalar_target_is_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ja_jp.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_target(&path).repair, TargetRepair::ResetUnreadable);
        fs::write(&path, "\"text\"").unwrap();
        assert_eq!(load_target(&path).repair, TargetRepair::ResetFromOtherShape);
    }

    #[test]
    fn non_mapping_source_has_nothing_to_do() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("en_us.json");
        fs::write(&source, r#"["a", "b"]"#).unwrap();
        let diff = diff_pair(&source, &dir.path().join("ja_jp.json")).unwrap();
        assert!(diff.is_none());
    }

    #[test]
    fn broken_source_is_an_error() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("en_us.json");
        fs::write(&source, "{").unwrap();
        assert!(diff_pair(&source, &dir.path().join("ja_jp.json")).is_err());
    }

    #[test]
    fn diff_pair_combines_source_and_target() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("en_us.json");
        let target = dir.path().join("ja_jp.json");
        fs::write(&source, r#"{"a": "Hello", "b": "World"}"#).unwrap();
        fs::write(&target, r#"{"a": "こんにちは"}"#).unwrap();
        let diff = diff_pair(&source, &target).unwrap().unwrap();
        assert_eq!(Value::Object(diff.outstanding), json!({"b": "World"}));
        assert_eq!(diff.target.repair, TargetRepair::Loaded);
    }
}
