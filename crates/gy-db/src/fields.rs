//! Ordered field maps flowing canonical records into SQL statements.
//!
//! Parsers produce typed records; each record lowers itself into a
//! [`Fields`] map before hitting the upsert protocol. Unknown keys are
//! dropped at insert time (`safe_create` semantics), and equality for
//! versioning compares fields by string conversion so numeric and text
//! representations normalize.

use rusqlite::types::Value;

/// An ordered collection of column/value pairs.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    entries: Vec<(&'static str, Value)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value, replacing any earlier value for the same column.
    pub fn set(&mut self, column: &'static str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(c, _)| *c == column) {
            entry.1 = value;
        } else {
            self.entries.push((column, value));
        }
        self
    }

    /// Builder-style variant of [`Fields::set`].
    pub fn with(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, Value)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Normalize a SQL value for equality comparison. `NULL` maps to
    /// `None`; everything else maps to its canonical text form.
    pub fn compare_string(value: &Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Blob(b) => Some(format!("<blob:{}>", b.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut fields = Fields::new();
        fields.set("title", "hello".to_string()).set("count", 3i64);

        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("title"), Some(&Value::Text("hello".into())));
        assert_eq!(fields.get("count"), Some(&Value::Integer(3)));
        assert!(fields.get("missing").is_none());
    }

    #[test]
    fn set_replaces_existing() {
        let mut fields = Fields::new();
        fields.set("title", "a".to_string());
        fields.set("title", "b".to_string());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("title"), Some(&Value::Text("b".into())));
    }

    #[test]
    fn option_lowers_to_null() {
        let fields = Fields::new().with("signature", None::<String>);
        assert_eq!(fields.get("signature"), Some(&Value::Null));
    }

    #[test]
    fn compare_string_normalizes_numeric_text() {
        assert_eq!(
            Fields::compare_string(&Value::Integer(42)),
            Fields::compare_string(&Value::Text("42".into()))
        );
        assert_eq!(Fields::compare_string(&Value::Null), None);
    }
}
