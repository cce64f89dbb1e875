use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered JSON object addressed with dotted paths (`"a.b.c"`).
///
/// `set` creates intermediate objects and overwrites non-object values in the way;
/// `forget` removes only the leaf and leaves empty parents behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag(Map<String, Value>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Typed read; `None` when missing or when the value has another shape.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get(path)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn has(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(leaf) = segments.pop() else {
            return;
        };

        let mut current = &mut self.0;
        for segment in segments {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = match entry.as_object_mut() {
                Some(map) => map,
                None => return,
            };
        }

        current.insert(leaf.to_string(), value.into());
    }

    /// Remove the value at `path`, returning it.
    pub fn forget(&mut self, path: &str) -> Option<Value> {
        let mut segments: Vec<&str> = path.split('.').collect();
        let leaf = segments.pop()?;

        let mut current = &mut self.0;
        for segment in segments {
            current = current.get_mut(segment)?.as_object_mut()?;
        }
        current.shift_remove(leaf)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for PropertyBag {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Custom property access for anything carrying a [`PropertyBag`].
pub trait HasCustomProperties {
    fn custom_properties(&self) -> &PropertyBag;

    fn custom_properties_mut(&mut self) -> &mut PropertyBag;

    fn has_custom_property(&self, path: &str) -> bool {
        self.custom_properties().has(path)
    }

    fn get_custom_property(&self, path: &str) -> Option<&Value> {
        self.custom_properties().get(path)
    }

    fn set_custom_property(&mut self, path: &str, value: impl Into<Value>)
    where
        Self: Sized,
    {
        self.custom_properties_mut().set(path, value);
    }

    fn forget_custom_property(&mut self, path: &str) -> Option<Value> {
        self.custom_properties_mut().forget(path)
    }
}
