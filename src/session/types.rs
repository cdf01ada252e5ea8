use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 内存中的会话对象
///
/// 任意 JSON 对象，由调用方的 Web 框架决定内容。存储层只关心
/// `user`、`passport.user` 和 `cookie` 三个字段。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session(Map<String, Value>);

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// 旧版身份字段
    pub fn user(&self) -> Option<&Value> {
        present(self.0.get("user"))
    }

    /// 当前身份字段 `passport.user`
    pub fn passport_user(&self) -> Option<&Value> {
        present(self.0.get("passport").and_then(|passport| passport.get("user")))
    }

    pub fn cookie(&self) -> Option<&Map<String, Value>> {
        self.0.get("cookie").and_then(Value::as_object)
    }

    pub(crate) fn entry_object(&mut self, key: &str) -> &mut Map<String, Value> {
        let slot = self
            .0
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just replaced with an object"),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Session {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// `null` 与缺失同样视为不存在
pub(crate) fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}
