use super::ScriptError;
use shared::{MechanicId, PlayerId, Vec2};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Point(Vec2),
    Player(PlayerId),
    Players(Vec<PlayerId>),
    Mechanic(MechanicId),
    Mechanics(Vec<MechanicId>),
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Int(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Float(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<Vec2> for ContextValue {
    fn from(value: Vec2) -> Self {
        ContextValue::Point(value)
    }
}

/// Named values a script carries between its steps. Every `run` starts with
/// a fresh one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptContext {
    values: HashMap<String, ContextValue>,
}

impl ScriptContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            ContextValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            ContextValue::Float(v) => Some(*v),
            ContextValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            ContextValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            ContextValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn point(&self, key: &str) -> Option<Vec2> {
        match self.get(key)? {
            ContextValue::Point(v) => Some(*v),
            _ => None,
        }
    }

    pub fn player(&self, key: &str) -> Option<PlayerId> {
        match self.get(key)? {
            ContextValue::Player(v) => Some(*v),
            _ => None,
        }
    }

    pub fn players(&self, key: &str) -> Option<&[PlayerId]> {
        match self.get(key)? {
            ContextValue::Players(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn mechanic(&self, key: &str) -> Option<MechanicId> {
        match self.get(key)? {
            ContextValue::Mechanic(v) => Some(*v),
            _ => None,
        }
    }

    pub fn mechanics(&self, key: &str) -> Option<&[MechanicId]> {
        match self.get(key)? {
            ContextValue::Mechanics(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Like [`ScriptContext::player`], but a missing or mistyped value is an
    /// error the script can propagate.
    pub fn require_player(&self, key: &str) -> Result<PlayerId, ScriptError> {
        self.player(key)
            .ok_or_else(|| ScriptError::MissingContext(key.to_string()))
    }

    pub fn require_players(&self, key: &str) -> Result<Vec<PlayerId>, ScriptError> {
        self.players(key)
            .map(|p| p.to_vec())
            .ok_or_else(|| ScriptError::MissingContext(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let ctx = ScriptContext::new()
            .with("phase", 2i64)
            .with("enraged", true)
            .with("name", "adds")
            .with("center", Vec2::new(1.0, 2.0))
            .with("tank", ContextValue::Player(3))
            .with("healers", ContextValue::Players(vec![4, 5]));

        assert_eq!(ctx.int("phase"), Some(2));
        assert_eq!(ctx.float("phase"), Some(2.0));
        assert_eq!(ctx.bool("enraged"), Some(true));
        assert_eq!(ctx.text("name"), Some("adds"));
        assert_eq!(ctx.point("center"), Some(Vec2::new(1.0, 2.0)));
        assert_eq!(ctx.player("tank"), Some(3));
        assert_eq!(ctx.players("healers"), Some(&[4, 5][..]));
        assert_eq!(ctx.len(), 6);
    }

    #[test]
    fn test_wrong_type_reads_as_missing() {
        let ctx = ScriptContext::new().with("tank", "not a player");
        assert_eq!(ctx.player("tank"), None);
        assert_eq!(
            ctx.require_player("tank"),
            Err(ScriptError::MissingContext("tank".to_string()))
        );
        assert_eq!(
            ctx.require_players("dps"),
            Err(ScriptError::MissingContext("dps".to_string()))
        );
    }

    #[test]
    fn test_overwrite_and_remove() {
        let mut ctx = ScriptContext::new();
        ctx.set("wave", 1i64);
        ctx.set("wave", 2i64);
        assert_eq!(ctx.int("wave"), Some(2));
        assert_eq!(ctx.remove("wave"), Some(ContextValue::Int(2)));
        assert!(ctx.is_empty());
        assert!(!ctx.contains("wave"));
    }
}
