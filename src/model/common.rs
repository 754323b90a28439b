use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Deserializer for clearable update fields. A field that is absent from
/// the JSON stays at the outer `None` (via `#[serde(default)]`); an
/// explicit `null` arrives here and becomes `Some(None)`, clearing the
/// stored value on apply.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Kind of value a feature carries. Declared once on the definition and
/// used as the discriminant for every value write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Table,
    Text,
    Number,
}

/// Which kind of subject entity a feature value hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Product,
    Lot,
}

/// Number formatting/parsing separators for one locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub name: String,
    pub decimal_point: char,
    pub thousands_sep: char,
}

impl Locale {
    /// Look up a named locale. Unknown names fall back to en_US.
    pub fn named(name: &str) -> Self {
        match name {
            "es_ES" | "fr_FR" | "de_DE" => Self {
                name: name.to_string(),
                decimal_point: ',',
                thousands_sep: '.',
            },
            _ => Self::default(),
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            name: "en_US".to_string(),
            decimal_point: '.',
            thousands_sep: ',',
        }
    }
}

/// Explicit per-request context: the organizational scope every uniqueness
/// constraint is partitioned by, and the locale used for numeric parse and
/// render. Threaded through every accessor call instead of ambient state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub scope_id: Id,
    pub locale: Locale,
}

impl RequestContext {
    pub fn new(scope_id: Id, locale: Locale) -> Self {
        Self { scope_id, locale }
    }

    /// Default context for development and tests.
    pub fn for_scope(scope_id: impl Into<Id>) -> Self {
        Self {
            scope_id: scope_id.into(),
            locale: Locale::default(),
        }
    }
}
