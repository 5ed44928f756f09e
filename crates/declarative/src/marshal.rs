//! Field descriptor tables
//!
//! A payload type describes its declarative attributes once, as a
//! [`FieldSet`]: a list of named fields, each with an optional getter (pack
//! direction, payload → state) and an optional setter (unpack direction,
//! declared configuration → payload). Descriptor sets compose: a base set is
//! embedded into a type-specific one, nested payloads are flattened into
//! their parent, and a field added under an existing name replaces the
//! earlier one.
//!
//! ```ignore
//! impl Marshal for Settings {
//!     fn fields() -> FieldSet<Self> {
//!         FieldSet::new()
//!             .attr("key", |s: &Settings| &s.key, |s| &mut s.key)
//!             .changed("notes", |s: &Settings| &s.notes, |s| &mut s.notes)
//!             .block("sync", |s: &Settings| &s.sync, |s| &mut s.sync)
//!     }
//! }
//! ```

use crate::data::ResourceData;
use crate::error::{Error, Result};
use crate::value::{Attributes, Value};
use std::sync::Arc;

type PackFn<T> = Box<dyn Fn(&T) -> Option<Value> + Send + Sync>;
type UnpackFn<T> = Box<dyn Fn(&mut T, &ResourceData) + Send + Sync>;

/// A payload type with a declarative field table
pub trait Marshal: Default + Send + Sync + 'static {
    fn fields() -> FieldSet<Self>;
}

/// Conversion between a payload field and an attribute value
pub trait Attr: Sized {
    /// Value to store; `None` leaves the attribute untouched
    fn to_value(&self) -> Option<Value>;

    /// Read the attribute through the typed accessors
    fn read(d: &ResourceData, key: &str, only_if_changed: bool) -> Self;

    /// Read as an optional value; `None` when unset or filtered out
    fn read_opt(d: &ResourceData, key: &str, only_if_changed: bool) -> Option<Self> {
        if only_if_changed && !d.has_change(key) {
            return None;
        }
        d.get_ok_exists(key)?;
        Some(Self::read(d, key, false))
    }
}

impl Attr for String {
    fn to_value(&self) -> Option<Value> {
        Some(Value::String(self.clone()))
    }

    fn read(d: &ResourceData, key: &str, only_if_changed: bool) -> Self {
        d.get_string(key, only_if_changed)
    }

    fn read_opt(d: &ResourceData, key: &str, only_if_changed: bool) -> Option<Self> {
        d.get_string_ref(key, only_if_changed)
    }
}

impl Attr for bool {
    fn to_value(&self) -> Option<Value> {
        Some(Value::Bool(*self))
    }

    fn read(d: &ResourceData, key: &str, only_if_changed: bool) -> Self {
        d.get_bool(key, only_if_changed)
    }

    fn read_opt(d: &ResourceData, key: &str, only_if_changed: bool) -> Option<Self> {
        d.get_bool_ref(key, only_if_changed)
    }
}

impl Attr for i64 {
    fn to_value(&self) -> Option<Value> {
        Some(Value::Int(*self))
    }

    fn read(d: &ResourceData, key: &str, only_if_changed: bool) -> Self {
        d.get_int(key, only_if_changed)
    }

    fn read_opt(d: &ResourceData, key: &str, only_if_changed: bool) -> Option<Self> {
        d.get_int_ref(key, only_if_changed)
    }
}

/// Packs as a list; the schema decides whether it is stored ordered or as a set
impl Attr for Vec<String> {
    fn to_value(&self) -> Option<Value> {
        Some(Value::string_list(self.iter().cloned()))
    }

    fn read(d: &ResourceData, key: &str, only_if_changed: bool) -> Self {
        d.get_list(key, only_if_changed)
    }
}

impl<T: Attr> Attr for Option<T> {
    fn to_value(&self) -> Option<Value> {
        self.as_ref().and_then(T::to_value)
    }

    fn read(d: &ResourceData, key: &str, only_if_changed: bool) -> Self {
        T::read_opt(d, key, only_if_changed)
    }
}

/// One named attribute of a payload type
pub struct Field<T> {
    name: String,
    pack: Option<PackFn<T>>,
    unpack: Option<UnpackFn<T>>,
}

impl<T> Field<T> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered field table for a payload type
pub struct FieldSet<T> {
    fields: Vec<Field<T>>,
}

impl<T: 'static> Default for FieldSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> FieldSet<T> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Add a field, replacing any earlier field with the same name
    #[must_use]
    fn field(mut self, field: Field<T>) -> Self {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    fn attr_with<V: Attr + 'static>(
        self,
        name: &str,
        only_if_changed: bool,
        get: impl Fn(&T) -> &V + Send + Sync + 'static,
        get_mut: impl Fn(&mut T) -> &mut V + Send + Sync + 'static,
    ) -> Self {
        let key = name.to_string();
        self.field(Field {
            name: name.to_string(),
            pack: Some(Box::new(move |t: &T| get(t).to_value())),
            unpack: Some(Box::new(move |t: &mut T, d: &ResourceData| {
                *get_mut(t) = V::read(d, &key, only_if_changed);
            })),
        })
    }

    /// Scalar or string-list attribute read with its current value
    #[must_use]
    pub fn attr<V: Attr + 'static>(
        self,
        name: &str,
        get: impl Fn(&T) -> &V + Send + Sync + 'static,
        get_mut: impl Fn(&mut T) -> &mut V + Send + Sync + 'static,
    ) -> Self {
        self.attr_with(name, false, get, get_mut)
    }

    /// Attribute read only when it changed; otherwise the zero value is sent
    #[must_use]
    pub fn changed<V: Attr + 'static>(
        self,
        name: &str,
        get: impl Fn(&T) -> &V + Send + Sync + 'static,
        get_mut: impl Fn(&mut T) -> &mut V + Send + Sync + 'static,
    ) -> Self {
        self.attr_with(name, true, get, get_mut)
    }

    /// Attribute the server reports but configuration never sends
    #[must_use]
    pub fn pack_only<V: Attr + 'static>(
        self,
        name: &str,
        get: impl Fn(&T) -> &V + Send + Sync + 'static,
    ) -> Self {
        self.field(Field {
            name: name.to_string(),
            pack: Some(Box::new(move |t: &T| get(t).to_value())),
            unpack: None,
        })
    }

    /// Attribute sent to the server but never read back into state
    #[must_use]
    pub fn unpack_only<V: Attr + 'static>(
        self,
        name: &str,
        only_if_changed: bool,
        get_mut: impl Fn(&mut T) -> &mut V + Send + Sync + 'static,
    ) -> Self {
        let key = name.to_string();
        self.field(Field {
            name: name.to_string(),
            pack: None,
            unpack: Some(Box::new(move |t: &mut T, d: &ResourceData| {
                *get_mut(t) = V::read(d, &key, only_if_changed);
            })),
        })
    }

    /// Optional nested payload, stored as a one-element block list
    #[must_use]
    pub fn block<B: Marshal>(
        self,
        name: &str,
        get: impl Fn(&T) -> &Option<B> + Send + Sync + 'static,
        get_mut: impl Fn(&mut T) -> &mut Option<B> + Send + Sync + 'static,
    ) -> Self {
        let key = name.to_string();
        self.field(Field {
            name: name.to_string(),
            pack: Some(Box::new(move |t: &T| {
                get(t)
                    .as_ref()
                    .map(|b| Value::block(B::fields().to_attributes(b)))
            })),
            unpack: Some(Box::new(move |t: &mut T, d: &ResourceData| {
                *get_mut(t) = d
                    .get_blocks(&key)
                    .first()
                    .map(|child| B::fields().unpack(child));
            })),
        })
    }

    /// Repeated nested payloads, stored as a block list
    #[must_use]
    pub fn blocks<B: Marshal>(
        self,
        name: &str,
        get: impl Fn(&T) -> &Vec<B> + Send + Sync + 'static,
        get_mut: impl Fn(&mut T) -> &mut Vec<B> + Send + Sync + 'static,
    ) -> Self {
        let key = name.to_string();
        self.field(Field {
            name: name.to_string(),
            pack: Some(Box::new(move |t: &T| {
                let fields = B::fields();
                Some(Value::List(
                    get(t)
                        .iter()
                        .map(|b| Value::Map(fields.to_attributes(b)))
                        .collect(),
                ))
            })),
            unpack: Some(Box::new(move |t: &mut T, d: &ResourceData| {
                let fields = B::fields();
                *get_mut(t) = d
                    .get_blocks(&key)
                    .iter()
                    .map(|child| fields.unpack(child))
                    .collect();
            })),
        })
    }

    /// Flatten a nested payload's fields into this table
    #[must_use]
    pub fn embed<E: 'static>(
        self,
        inner: FieldSet<E>,
        get: impl Fn(&T) -> &E + Send + Sync + 'static,
        get_mut: impl Fn(&mut T) -> &mut E + Send + Sync + 'static,
    ) -> Self {
        self.project(inner, move |t| Some(get(t)), move |t| Some(get_mut(t)))
    }

    /// Flatten the fields of a payload that may be absent, such as one
    /// variant of an enum. Absent payloads pack nothing and unpack nothing.
    #[must_use]
    pub fn project<E: 'static>(
        mut self,
        inner: FieldSet<E>,
        get: impl Fn(&T) -> Option<&E> + Send + Sync + 'static,
        get_mut: impl Fn(&mut T) -> Option<&mut E> + Send + Sync + 'static,
    ) -> Self {
        let get = Arc::new(get);
        let get_mut = Arc::new(get_mut);
        for Field { name, pack, unpack } in inner.fields {
            let pack = pack.map(|p| {
                let get = Arc::clone(&get);
                Box::new(move |t: &T| (*get)(t).and_then(|e| p(e))) as PackFn<T>
            });
            let unpack = unpack.map(|u| {
                let get_mut = Arc::clone(&get_mut);
                Box::new(move |t: &mut T, d: &ResourceData| {
                    if let Some(e) = (*get_mut)(t) {
                        u(e, d);
                    }
                }) as UnpackFn<T>
            });
            self = self.field(Field { name, pack, unpack });
        }
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(Field::name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Flat attribute map of a payload. Packing is pure: the same payload
    /// always yields the same map.
    pub fn to_attributes(&self, payload: &T) -> Attributes {
        self.fields
            .iter()
            .filter_map(|f| {
                let pack = f.pack.as_ref()?;
                pack(payload).map(|v| (f.name.clone(), v))
            })
            .collect()
    }

    /// Write a payload into resource state.
    ///
    /// Keys the resource schema does not declare are skipped. Every key is
    /// attempted; failures are returned together as one aggregated error.
    pub fn pack(&self, payload: &T, d: &mut ResourceData) -> Result<()> {
        let values = self.to_attributes(payload);
        let mut errors = Vec::new();
        for (key, value) in values {
            if !d.schema().has_key(&key) {
                continue;
            }
            if let Err(e) = d.set(&key, value) {
                errors.push(e);
            }
        }
        Error::aggregate(errors)
    }

    /// Fill a payload's described fields from resource data
    pub fn unpack_into(&self, payload: &mut T, d: &ResourceData) {
        for field in &self.fields {
            if let Some(unpack) = &field.unpack {
                unpack(payload, d);
            }
        }
    }

    /// Build a payload from resource data, starting from its default
    pub fn unpack(&self, d: &ResourceData) -> T
    where
        T: Default,
    {
        let mut payload = T::default();
        self.unpack_into(&mut payload, d);
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Schema};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct ContentSync {
        enabled: bool,
        statistics: bool,
    }

    impl Marshal for ContentSync {
        fn fields() -> FieldSet<Self> {
            FieldSet::new().attr("enabled", |s: &ContentSync| &s.enabled, |s| &mut s.enabled)
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Base {
        key: String,
        notes: Option<String>,
        blacked_out: Option<bool>,
        tags: Vec<String>,
        secret: String,
        server_only: i64,
    }

    fn base_fields() -> FieldSet<Base> {
        FieldSet::new()
            .attr("key", |b: &Base| &b.key, |b| &mut b.key)
            .changed("notes", |b: &Base| &b.notes, |b| &mut b.notes)
            .attr("blacked_out", |b: &Base| &b.blacked_out, |b| &mut b.blacked_out)
            .attr("tags", |b: &Base| &b.tags, |b| &mut b.tags)
            .unpack_only("secret", false, |b: &mut Base| &mut b.secret)
            .pack_only("server_only", |b: &Base| &b.server_only)
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Repo {
        base: Base,
        url: String,
        sync: Option<ContentSync>,
    }

    impl Marshal for Repo {
        fn fields() -> FieldSet<Self> {
            FieldSet::new()
                .embed(base_fields(), |r: &Repo| &r.base, |r| &mut r.base)
                .attr("url", |r: &Repo| &r.url, |r| &mut r.url)
                .block("sync", |r: &Repo| &r.sync, |r| &mut r.sync)
        }
    }

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new()
                .with("key", Attribute::string().required())
                .with("notes", Attribute::string().optional())
                .with("blacked_out", Attribute::bool().optional())
                .with("tags", Attribute::string_set().optional())
                .with("secret", Attribute::string().optional().sensitive())
                .with("server_only", Attribute::int().computed())
                .with("url", Attribute::string().optional())
                .with(
                    "sync",
                    Attribute::block(Schema::new().with("enabled", Attribute::bool().optional()))
                        .optional()
                        .max_items(1),
                ),
        )
    }

    fn sample() -> Repo {
        Repo {
            base: Base {
                key: "my-repo".into(),
                notes: Some("n".into()),
                blacked_out: Some(false),
                tags: vec!["b".into(), "a".into()],
                secret: "s3cret".into(),
                server_only: 3,
            },
            url: "https://example.com".into(),
            sync: Some(ContentSync {
                enabled: true,
                statistics: true,
            }),
        }
    }

    #[test]
    fn test_pack_flattens_and_wraps_blocks() {
        let attrs = Repo::fields().to_attributes(&sample());

        assert_eq!(attrs["key"], Value::from("my-repo"));
        assert_eq!(attrs["server_only"], Value::Int(3));
        assert!(!attrs.contains_key("secret"));

        let mut sync = Attributes::new();
        sync.insert("enabled".into(), true.into());
        assert_eq!(attrs["sync"], Value::block(sync));
    }

    #[test]
    fn test_pack_is_idempotent() {
        let fields = Repo::fields();
        let repo = sample();
        assert_eq!(fields.to_attributes(&repo), fields.to_attributes(&repo));
    }

    #[test]
    fn test_pack_into_state_coerces_sets() {
        let mut d = ResourceData::import(schema(), "my-repo");
        Repo::fields().pack(&sample(), &mut d).unwrap();
        assert_eq!(d.get("tags"), &Value::string_set(["a", "b"]));
        assert_eq!(d.get_bool_ref("blacked_out", false), Some(false));
    }

    #[test]
    fn test_pack_skips_undeclared_and_aggregates_errors() {
        let narrow = Arc::new(
            Schema::new()
                .with("key", Attribute::bool().optional())
                .with("url", Attribute::int().optional()),
        );
        let mut d = ResourceData::import(narrow, "x");
        let err = Repo::fields().pack(&sample(), &mut d).unwrap_err();
        match err {
            Error::Aggregate(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_round_trip_on_common_fields() {
        let repo = sample();
        let mut state = ResourceData::import(schema(), "my-repo");
        Repo::fields().pack(&repo, &mut state).unwrap();

        let d = ResourceData::new(schema(), "", Attributes::new(), state.state());
        let back = Repo::fields().unpack(&d);

        assert_eq!(back.base.key, repo.base.key);
        assert_eq!(back.base.notes, repo.base.notes);
        assert_eq!(back.base.blacked_out, repo.base.blacked_out);
        assert_eq!(back.base.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(back.url, repo.url);
        assert_eq!(back.sync.map(|s| s.enabled), Some(true));
        assert_eq!(back.base.server_only, 0);
    }

    #[test]
    fn test_changed_fields_are_zeroed_when_unchanged() {
        let mut prior = Attributes::new();
        prior.insert("key".into(), "my-repo".into());
        prior.insert("notes".into(), "n".into());
        let d = ResourceData::new(schema(), "my-repo", prior.clone(), prior);

        let back = Repo::fields().unpack(&d);
        assert_eq!(back.base.key, "my-repo");
        assert_eq!(back.base.notes, None);
    }

    #[derive(Debug, Default)]
    enum Ext {
        #[default]
        None,
        Docker(Docker),
    }

    #[derive(Debug, Default)]
    struct Docker {
        max_unique_tags: i64,
    }

    #[derive(Debug, Default)]
    struct Messy {
        key: String,
        ext: Ext,
    }

    impl Marshal for Messy {
        fn fields() -> FieldSet<Self> {
            let docker = FieldSet::new().attr(
                "max_unique_tags",
                |d: &Docker| &d.max_unique_tags,
                |d| &mut d.max_unique_tags,
            );
            FieldSet::new()
                .attr("key", |m: &Messy| &m.key, |m| &mut m.key)
                .project(
                    docker,
                    |m: &Messy| match &m.ext {
                        Ext::Docker(d) => Some(d),
                        Ext::None => None,
                    },
                    |m| match &mut m.ext {
                        Ext::Docker(d) => Some(d),
                        Ext::None => None,
                    },
                )
        }
    }

    #[test]
    fn test_project_follows_variant() {
        let fields = Messy::fields();
        let plain = Messy {
            key: "k".into(),
            ext: Ext::None,
        };
        assert!(!fields.to_attributes(&plain).contains_key("max_unique_tags"));

        let docker = Messy {
            key: "k".into(),
            ext: Ext::Docker(Docker { max_unique_tags: 5 }),
        };
        assert_eq!(
            fields.to_attributes(&docker)["max_unique_tags"],
            Value::Int(5)
        );
    }

    #[test]
    fn test_later_field_replaces_earlier() {
        let fields = base_fields().pack_only("key", |b: &Base| &b.server_only);
        assert_eq!(fields.names().filter(|n| *n == "key").count(), 1);
        let attrs = fields.to_attributes(&sample().base);
        assert_eq!(attrs["key"], Value::Int(3));
    }
}
