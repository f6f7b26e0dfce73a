// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 类别映射 (Class mapping)
///
/// 类别文件格式 (YAML 或 JSON):
/// ```yaml
/// classes:
///   - id: 0
///     name: person
///   - id: 1
///     name: car
/// ```
use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, YoloError};

#[derive(Debug, Clone, Deserialize)]
struct ClassRecord {
    id: usize,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassFile {
    Wrapped { classes: Vec<ClassRecord> },
    Plain(Vec<ClassRecord>),
}

impl ClassFile {
    fn into_records(self) -> Vec<ClassRecord> {
        match self {
            ClassFile::Wrapped { classes } => classes,
            ClassFile::Plain(classes) => classes,
        }
    }
}

/// 只读的 id → 名称映射, 缺失的 id 解析为 `Class_<id>`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassMapping {
    names: HashMap<usize, String>,
}

impl ClassMapping {
    /// 从文件加载, `.json` 按 JSON 解析, 其余按 YAML 解析
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let err = |reason: String| YoloError::LabelSource {
            path: path.to_path_buf(),
            reason,
        };

        let text = std::fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let file: ClassFile = if is_json {
            serde_json::from_str(&text).map_err(|e| err(e.to_string()))?
        } else {
            serde_yaml::from_str(&text).map_err(|e| err(e.to_string()))?
        };

        let mapping = Self::from_pairs(
            file.into_records()
                .into_iter()
                .map(|ClassRecord { id, name }| (id, name)),
        );
        tracing::debug!("loaded {} class labels from {}", mapping.len(), path.display());
        Ok(mapping)
    }

    /// 后出现的同 id 记录覆盖先出现的
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        Self {
            names: pairs.into_iter().map(|(id, s)| (id, s.into())).collect(),
        }
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// 类别名称, 缺失时为 `Class_<id>`
    pub fn name(&self, id: usize) -> String {
        match self.get(id) {
            Some(name) => name.to_string(),
            None => format!("Class_{id}"),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_yaml_classes() {
        let f = write_tmp(
            ".yaml",
            "classes:\n  - id: 0\n    name: person\n  - id: 2\n    name: car\n",
        );
        let m = ClassMapping::load(f.path()).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.name(0), "person");
        assert_eq!(m.name(2), "car");
    }

    #[test]
    fn loads_json_classes() {
        let f = write_tmp(".json", r#"[{"id": 3, "name": "dog"}]"#);
        let m = ClassMapping::load(f.path()).unwrap();
        assert_eq!(m.get(3), Some("dog"));
    }

    #[test]
    fn missing_id_gets_placeholder() {
        let m = ClassMapping::from_pairs([(0, "a")]);
        assert_eq!(m.name(42), "Class_42");
        assert_eq!(m.get(42), None);
    }

    #[test]
    fn missing_file_is_label_source_error() {
        let err = ClassMapping::load("/definitely/not/here/classes.yaml").unwrap_err();
        assert!(matches!(err, YoloError::LabelSource { .. }));
    }

    #[test]
    fn malformed_file_is_label_source_error() {
        let f = write_tmp(".yaml", "classes: 12\n");
        let err = ClassMapping::load(f.path()).unwrap_err();
        assert!(matches!(err, YoloError::LabelSource { .. }));
    }
}
