//! 答案缓存 - 业务能力层
//!
//! 以面包屑路径为键的持久化答案存储。按顺序存储答案数组，
//! 文件是普通 JSON，便于人工编辑。
//!
//! 叶子结构：`{"type": "<题型标签>", "answers": ["...", ...]}`
//!
//! 容错约定：文件缺失视为空缓存；JSON 损坏告警后视为空缓存，
//! 启动永不因缓存失败。每次 save 都整体落盘（临时文件 + 重命名），
//! 进程崩溃最多丢失正在处理的一页。

use serde_json::{json, Map, Value as JsonValue};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::strategy::Variant;

/// 一条缓存记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub variant: Variant,
    pub answers: Vec<String>,
}

impl CacheEntry {
    /// 复用前的防错校验：答案数量必须与当前页面的作答槽位数一致。
    /// 不一致的缓存记录一律不信任（宁可重新调 AI）。
    pub fn matches_slots(&self, slot_count: usize) -> bool {
        self.answers.len() == slot_count
    }
}

/// 答案缓存
pub struct AnswerCache {
    file_path: PathBuf,
    root: JsonValue,
}

impl AnswerCache {
    /// 从文件加载缓存；文件缺失或损坏时从空缓存开始
    pub fn load(file_path: impl Into<PathBuf>) -> Self {
        let file_path = file_path.into();
        let root = match std::fs::read_to_string(&file_path) {
            Ok(content) if content.trim().is_empty() => json!({}),
            Ok(content) => match serde_json::from_str::<JsonValue>(&content) {
                Ok(JsonValue::Object(map)) => JsonValue::Object(map),
                Ok(_) => {
                    warn!(
                        "缓存文件 {} 的顶层不是对象，将从空缓存开始。",
                        file_path.display()
                    );
                    json!({})
                }
                Err(e) => {
                    warn!(
                        "读取缓存文件 {} 时出错: {}。将从空缓存开始。",
                        file_path.display(),
                        e
                    );
                    json!({})
                }
            },
            Err(_) => json!({}),
        };
        info!("缓存服务已初始化，使用文件: {}", file_path.display());
        Self { file_path, root }
    }

    /// 根据面包屑路径查找缓存记录
    ///
    /// 路径上任何一段缺失都返回 None；叶子缺字段或标签不认识也视为未命中。
    pub fn get(&self, location_key: &[String]) -> Option<CacheEntry> {
        let mut current = &self.root;
        for part in location_key {
            current = current.as_object()?.get(part)?;
        }
        let leaf = current.as_object()?;
        let variant = Variant::from_tag(leaf.get("type")?.as_str()?)?;
        let answers = leaf
            .get("answers")?
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(|s| s.to_string()))
            .collect::<Option<Vec<_>>>()?;
        Some(CacheEntry { variant, answers })
    }

    /// 把一个任务页面的所有答案作为整体存入缓存并立即落盘
    ///
    /// 同一路径上的旧记录会被整体覆盖。
    pub fn save(
        &mut self,
        location_key: &[String],
        variant: Variant,
        answers: &[String],
    ) -> AppResult<()> {
        let mut current = &mut self.root;
        for part in location_key {
            if !current.is_object() {
                *current = json!({});
            }
            current = current
                .as_object_mut()
                .ok_or_else(|| AppError::Other("缓存树节点类型异常".to_string()))?
                .entry(part.clone())
                .or_insert_with(|| json!({}));
        }
        *current = json!({
            "type": variant.tag(),
            "answers": answers,
        });
        self.persist()?;
        info!(
            "页面答案已按顺序整体保存到缓存路径: {}",
            location_key.join(" -> ")
        );
        Ok(())
    }

    /// 清除所有缓存
    pub fn clear(&mut self) -> AppResult<()> {
        self.root = JsonValue::Object(Map::new());
        self.persist()?;
        info!("缓存已清除。");
        Ok(())
    }

    /// 整体落盘：写同目录临时文件后原子重命名
    fn persist(&self) -> AppResult<()> {
        let content = serde_json::to_string_pretty(&self.root).map_err(|e| {
            AppError::Cache(crate::error::CacheError::SerializeFailed {
                source: Box::new(e),
            })
        })?;
        let tmp_path = temp_sibling(&self.file_path);
        std::fs::write(&tmp_path, content)
            .map_err(|e| AppError::cache_write_failed(tmp_path.display().to_string(), e))?;
        std::fs::rename(&tmp_path, &self.file_path)
            .map_err(|e| AppError::cache_write_failed(self.file_path.display().to_string(), e))?;
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "answer_cache.json".to_string());
    name.push_str(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let cache = AnswerCache::load(dir.path().join("absent.json"));
        assert!(cache.get(&key(&["CourseA"])).is_none());
    }

    #[test]
    fn test_malformed_file_is_empty_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not valid json").unwrap();
        let cache = AnswerCache::load(&path);
        assert!(cache.get(&key(&["a"])).is_none());
    }

    #[test]
    fn test_save_then_get_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = AnswerCache::load(&path);

        let k = key(&["CourseA", "Unit1", "Listening", "3"]);
        let answers = vec!["B".to_string()];
        cache.save(&k, Variant::SingleChoice, &answers).unwrap();

        let entry = cache.get(&k).unwrap();
        assert_eq!(entry.variant, Variant::SingleChoice);
        assert_eq!(entry.answers, answers);

        // 重新加载后仍然可读（持久化生效）
        let reloaded = AnswerCache::load(&path);
        let entry = reloaded.get(&k).unwrap();
        assert_eq!(entry.answers, vec!["B".to_string()]);
    }

    #[test]
    fn test_save_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut cache = AnswerCache::load(dir.path().join("cache.json"));

        let k = key(&["C", "U", "T", "1"]);
        let answers = vec!["on".to_string(), "beside".to_string()];
        cache.save(&k, Variant::FillInTheBlank, &answers).unwrap();
        cache.save(&k, Variant::FillInTheBlank, &answers).unwrap();

        let entry = cache.get(&k).unwrap();
        assert_eq!(entry.answers, answers);
    }

    #[test]
    fn test_save_overwrites_existing_entry() {
        let dir = tempdir().unwrap();
        let mut cache = AnswerCache::load(dir.path().join("cache.json"));

        let k = key(&["C", "U", "T", "1"]);
        cache
            .save(&k, Variant::SingleChoice, &[String::from("A")])
            .unwrap();
        cache
            .save(&k, Variant::SingleChoice, &[String::from("C")])
            .unwrap();

        assert_eq!(cache.get(&k).unwrap().answers, vec!["C".to_string()]);
    }

    #[test]
    fn test_distinct_keys_never_collide() {
        let dir = tempdir().unwrap();
        let mut cache = AnswerCache::load(dir.path().join("cache.json"));

        // 同样的段但顺序不同，以及前缀关系的键，都互不干扰
        let k1 = key(&["A", "B"]);
        let k2 = key(&["B", "A"]);
        cache.save(&k1, Variant::SingleChoice, &[String::from("1")]).unwrap();
        cache.save(&k2, Variant::SingleChoice, &[String::from("2")]).unwrap();

        assert_eq!(cache.get(&k1).unwrap().answers, vec!["1".to_string()]);
        assert_eq!(cache.get(&k2).unwrap().answers, vec!["2".to_string()]);
    }

    #[test]
    fn test_get_missing_path_segment() {
        let dir = tempdir().unwrap();
        let mut cache = AnswerCache::load(dir.path().join("cache.json"));
        cache
            .save(&key(&["A", "B", "C"]), Variant::DragOrder, &[String::from("x")])
            .unwrap();

        assert!(cache.get(&key(&["A", "B"])).is_none()); // 中间节点不是叶子
        assert!(cache.get(&key(&["A", "X", "C"])).is_none());
    }

    #[test]
    fn test_unknown_tag_treated_as_miss() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{"A": {"type": "legacy_hash_shape", "answers": ["x"]}}"#,
        )
        .unwrap();
        let cache = AnswerCache::load(&path);
        assert!(cache.get(&key(&["A"])).is_none());
    }

    #[test]
    fn test_matches_slots_guard() {
        let entry = CacheEntry {
            variant: Variant::SingleChoice,
            answers: vec!["B".to_string()],
        };
        assert!(entry.matches_slots(1));
        assert!(!entry.matches_slots(2));
        assert!(!entry.matches_slots(0));
    }

    #[test]
    fn test_nested_structure_matches_on_disk_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = AnswerCache::load(&path);
        cache
            .save(
                &key(&["CourseA", "Unit1", "Listening", "3"]),
                Variant::SingleChoice,
                &[String::from("B")],
            )
            .unwrap();

        let raw: JsonValue =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw["CourseA"]["Unit1"]["Listening"]["3"],
            json!({"type": "single_choice", "answers": ["B"]})
        );
    }
}
