//! Declarative field rules for request payloads.
//!
//! A payload type describes its rules once in [`Validate::schema`]. When a
//! route is registered the schema is compiled into a [`RuleTable`], which also
//! flattens every custom message into a map keyed by field path:
//!
//! ```text
//! NewOrder.amount            → "amount required"
//! NewOrder.address.street    → "street required"
//! ```
//!
//! The root segment is the payload's type name; nested segments are field
//! names. A violation whose path has a custom message reports that message,
//! anything else reports the default rule-engine text.
//!
//! ```rust
//! use gatehouse::validate::{Rule, RuleTable, Schema, Validate};
//!
//! struct NewOrder { amount: Option<i64>, note: String }
//!
//! impl Validate for NewOrder {
//!     fn schema() -> Schema<Self> {
//!         Schema::<Self>::new("NewOrder")
//!             .field("amount", |o| o.amount.into(), [Rule::Required]).message("amount required")
//!             .field("note", |o| o.note.as_str().into(), [Rule::len(0, 16)])
//!     }
//! }
//!
//! let table = RuleTable::<NewOrder>::compile();
//! let violations = table.check(&NewOrder { amount: None, note: String::new() });
//! assert_eq!(table.render(&violations), "amount required");
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::error::ARGS_INVALID;

// ── Values ────────────────────────────────────────────────────────────────────

/// A field value as seen by the rules.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value<'a> {
    Missing,
    Str(&'a str),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// A collection, reduced to its length.
    Len(usize),
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Self::Str(v)
    }
}

impl<'a> From<&'a String> for Value<'a> {
    fn from(v: &'a String) -> Self {
        Self::Str(v)
    }
}

impl<'a, T> From<&'a Vec<T>> for Value<'a> {
    fn from(v: &'a Vec<T>) -> Self {
        Self::Len(v.len())
    }
}

impl<'a, T> From<&'a [T]> for Value<'a> {
    fn from(v: &'a [T]) -> Self {
        Self::Len(v.len())
    }
}

impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for Value<'_> {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<u64> for Value<'_> {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Self::Float(v as f64), Self::Int)
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {$(
        impl From<$t> for Value<'_> {
            fn from(v: $t) -> Self {
                Self::Int(i64::from(v))
            }
        }
    )*};
}

int_value!(i8, i16, i32, i64, u8, u16, u32);

impl<'a, T: Into<Value<'a>>> From<Option<T>> for Value<'a> {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Missing, Into::into)
    }
}

// ── Rules ─────────────────────────────────────────────────────────────────────

/// A single constraint on a field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rule {
    /// Present, and not an empty string or empty collection.
    Required,
    /// String length in chars, or collection length, within `min..=max`.
    Len { min: usize, max: usize },
    /// Numeric value within `min..=max`.
    Range { min: f64, max: f64 },
    /// String equal to one of the listed values.
    OneOf(&'static [&'static str]),
}

impl Rule {
    pub fn len(min: usize, max: usize) -> Self {
        Self::Len { min, max }
    }

    pub fn range(min: f64, max: f64) -> Self {
        Self::Range { min, max }
    }

    /// Tag reported in default messages.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Len { .. } => "len",
            Self::Range { .. } => "range",
            Self::OneOf(_) => "oneof",
        }
    }

    /// Whether `value` satisfies the rule. Only `Required` rejects a missing
    /// value; a rule applied to a kind it does not understand always fails.
    pub fn accepts(&self, value: Value<'_>) -> bool {
        match (self, value) {
            (Self::Required, Value::Missing) => false,
            (Self::Required, Value::Str(s)) => !s.is_empty(),
            (Self::Required, Value::Len(n)) => n > 0,
            (Self::Required, _) => true,

            (_, Value::Missing) => true,

            (Self::Len { min, max }, Value::Str(s)) => (*min..=*max).contains(&s.chars().count()),
            (Self::Len { min, max }, Value::Len(n)) => (*min..=*max).contains(&n),
            (Self::Range { min, max }, Value::Int(i)) => (*min..=*max).contains(&(i as f64)),
            (Self::Range { min, max }, Value::Float(f)) => (*min..=*max).contains(&f),
            (Self::OneOf(allowed), Value::Str(s)) => allowed.iter().any(|a| *a == s),
            _ => false,
        }
    }
}

// ── Violations ────────────────────────────────────────────────────────────────

/// One broken rule on one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Full field path, e.g. `NewOrder.address.street`.
    pub path: String,
    pub field: &'static str,
    pub tag: &'static str,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Key: '{}' Error:Field validation for '{}' failed on the '{}' tag",
            self.path, self.field, self.tag,
        )
    }
}

/// Every violation found in one payload, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }

    fn push(&mut self, v: Violation) {
        self.0.push(v);
    }
}

// ── Schema ────────────────────────────────────────────────────────────────────

type Getter<T> = for<'a> fn(&'a T) -> Value<'a>;
type NestedCheck<T> = Box<dyn Fn(&T, &str, &mut Violations) + Send + Sync>;

enum Kind<T> {
    Value { get: Getter<T>, rules: Vec<Rule> },
    Nested { check: NestedCheck<T>, messages: Vec<(String, String)> },
}

struct Field<T> {
    name: &'static str,
    message: Option<String>,
    kind: Kind<T>,
}

/// The rules of one payload type.
pub struct Schema<T> {
    name: &'static str,
    fields: Vec<Field<T>>,
}

impl<T: 'static> Schema<T> {
    pub fn new(type_name: &'static str) -> Self {
        Self { name: type_name, fields: Vec::new() }
    }

    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Adds rules for one field.
    pub fn field(
        mut self,
        name: &'static str,
        get: Getter<T>,
        rules: impl IntoIterator<Item = Rule>,
    ) -> Self {
        self.fields.push(Field {
            name,
            message: None,
            kind: Kind::Value { get, rules: rules.into_iter().collect() },
        });
        self
    }

    /// Sets the custom message of the most recently added field.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.message = Some(message.into());
        }
        self
    }

    /// Descends into a nested payload when it is present.
    pub fn nested<U: Validate>(mut self, name: &'static str, get: for<'a> fn(&'a T) -> Option<&'a U>) -> Self {
        let inner = U::schema();
        let messages = inner.relative_messages();
        let check: NestedCheck<T> = Box::new(move |value: &T, path: &str, out: &mut Violations| {
            if let Some(nested) = get(value) {
                inner.check_at(nested, &format!("{path}.{name}"), out);
            }
        });
        self.fields.push(Field { name, message: None, kind: Kind::Nested { check, messages } });
        self
    }

    fn check_at(&self, value: &T, path: &str, out: &mut Violations) {
        for field in &self.fields {
            match &field.kind {
                Kind::Value { get, rules } => {
                    let v = get(value);
                    if let Some(rule) = rules.iter().find(|r| !r.accepts(v)) {
                        out.push(Violation {
                            path: format!("{path}.{}", field.name),
                            field: field.name,
                            tag: rule.tag(),
                        });
                    }
                }
                Kind::Nested { check, .. } => check(value, path, out),
            }
        }
    }

    /// Custom messages keyed by path relative to this schema's root.
    fn relative_messages(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for field in &self.fields {
            if let Some(msg) = &field.message {
                out.push((field.name.to_owned(), msg.clone()));
            }
            if let Kind::Nested { messages, .. } = &field.kind {
                out.extend(
                    messages
                        .iter()
                        .map(|(rel, msg)| (format!("{}.{rel}", field.name), msg.clone())),
                );
            }
        }
        out
    }
}

// ── Validate ──────────────────────────────────────────────────────────────────

/// Implemented by every route payload.
///
/// The default schema has no rules and is named after the type.
pub trait Validate: Sized + Send + Sync + 'static {
    fn schema() -> Schema<Self> {
        Schema::new(short_type_name::<Self>())
    }
}

/// Last path segment of `T`'s type name, e.g. `NewOrder`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ── RuleTable ─────────────────────────────────────────────────────────────────

/// A payload schema compiled together with its field-path → message map.
///
/// Built once per route when the route is registered.
pub struct RuleTable<T> {
    schema: Schema<T>,
    messages: HashMap<String, String>,
}

impl<T: Validate> RuleTable<T> {
    pub fn compile() -> Self {
        let schema = T::schema();
        let messages = schema
            .relative_messages()
            .into_iter()
            .map(|(rel, msg)| (format!("{}.{rel}", schema.name), msg))
            .collect();
        Self { schema, messages }
    }
}

impl<T: 'static> RuleTable<T> {
    pub fn check(&self, value: &T) -> Violations {
        let mut out = Violations::default();
        self.schema.check_at(value, self.schema.name, &mut out);
        out
    }

    /// Custom message registered for an exact field path.
    pub fn message_for(&self, path: &str) -> Option<&str> {
        self.messages.get(path).map(String::as_str)
    }

    /// One line per violation: its custom message, else the default text.
    /// Falls back to a generic message when nothing resolves.
    pub fn render(&self, violations: &Violations) -> String {
        let msg = violations
            .iter()
            .map(|v| self.message_for(&v.path).map_or_else(|| v.to_string(), str::to_owned))
            .filter(|m| !m.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if msg.is_empty() { ARGS_INVALID.to_owned() } else { msg }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Address {
        street: String,
        zip: Option<String>,
    }

    impl Validate for Address {
        fn schema() -> Schema<Self> {
            Schema::<Self>::new("Address")
                .field("street", |a| (&a.street).into(), [Rule::Required])
                .message("street required")
                .field("zip", |a| a.zip.as_deref().into(), [Rule::Required, Rule::len(5, 5)])
        }
    }

    struct NewOrder {
        amount: Option<i64>,
        currency: String,
        tags: Vec<String>,
        address: Option<Address>,
    }

    impl Validate for NewOrder {
        fn schema() -> Schema<Self> {
            Schema::<Self>::new("NewOrder")
                .field("amount", |o| o.amount.into(), [Rule::Required, Rule::range(1.0, 1000.0)])
                .message("amount required")
                .field("currency", |o| o.currency.as_str().into(), [Rule::OneOf(&["CNY", "USD"])])
                .field("tags", |o| (&o.tags).into(), [Rule::len(0, 2)])
                .nested("address", |o| o.address.as_ref())
        }
    }

    fn order() -> NewOrder {
        NewOrder {
            amount: Some(10),
            currency: "USD".to_owned(),
            tags: vec![],
            address: Some(Address { street: "Main".to_owned(), zip: Some("12345".to_owned()) }),
        }
    }

    struct Plain;
    impl Validate for Plain {}

    #[test]
    fn valid_payload_has_no_violations() {
        let table = RuleTable::<NewOrder>::compile();
        assert!(table.check(&order()).is_empty());
    }

    #[test]
    fn message_table_uses_type_then_field_names() {
        let table = RuleTable::<NewOrder>::compile();
        assert_eq!(table.message_for("NewOrder.amount"), Some("amount required"));
        assert_eq!(table.message_for("NewOrder.address.street"), Some("street required"));
        assert_eq!(table.message_for("NewOrder.currency"), None);
    }

    #[test]
    fn custom_message_wins_and_default_fills_the_rest() {
        let table = RuleTable::<NewOrder>::compile();
        let mut o = order();
        o.amount = None;
        o.currency = "EUR".to_owned();
        let v = table.check(&o);
        assert_eq!(v.len(), 2);
        assert_eq!(
            table.render(&v),
            "amount required\n\
             Key: 'NewOrder.currency' Error:Field validation for 'currency' failed on the 'oneof' tag",
        );
    }

    #[test]
    fn nested_violations_carry_full_path() {
        let table = RuleTable::<NewOrder>::compile();
        let mut o = order();
        o.address = Some(Address { street: String::new(), zip: Some("1".to_owned()) });
        let v = table.check(&o);
        let paths: Vec<_> = v.iter().map(|x| x.path.as_str()).collect();
        assert_eq!(paths, ["NewOrder.address.street", "NewOrder.address.zip"]);
        assert_eq!(v.iter().nth(1).map(|x| x.tag), Some("len"));
        assert!(table.render(&v).starts_with("street required\n"));
    }

    #[test]
    fn absent_nested_payload_is_skipped() {
        let table = RuleTable::<NewOrder>::compile();
        let mut o = order();
        o.address = None;
        assert!(table.check(&o).is_empty());
    }

    #[test]
    fn first_failing_rule_is_reported_once_per_field() {
        let table = RuleTable::<NewOrder>::compile();
        let mut o = order();
        o.amount = Some(5000);
        let v = table.check(&o);
        assert_eq!(v.len(), 1);
        assert_eq!(v.iter().next().map(|x| x.tag), Some("range"));
        // custom message is per field, not per rule
        assert_eq!(table.render(&v), "amount required");
    }

    #[test]
    fn empty_violations_render_generic_message() {
        let table = RuleTable::<Plain>::compile();
        assert_eq!(table.render(&Violations::default()), ARGS_INVALID);
        assert_eq!(table.schema.type_name(), "Plain");
    }

    #[test]
    fn required_rejects_empty_values() {
        assert!(!Rule::Required.accepts(Value::Missing));
        assert!(!Rule::Required.accepts(Value::Str("")));
        assert!(!Rule::Required.accepts(Value::Len(0)));
        assert!(Rule::Required.accepts(Value::Int(0)));
        assert!(Rule::len(1, 3).accepts(Value::Missing));
        assert!(!Rule::range(0.0, 1.0).accepts(Value::Str("x")));
    }
}
