use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Opaque store-assigned identifier, unique within a kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Product,
    Variant,
    Category,
    Profile,
}

/// Scan order: parents before children, so reference checks during a run
/// see already-repaired parents.
pub const ALL_KINDS: [RecordKind; 4] = [
    RecordKind::Category,
    RecordKind::Product,
    RecordKind::Variant,
    RecordKind::Profile,
];

impl RecordKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            RecordKind::Product => "product",
            RecordKind::Variant => "variant",
            RecordKind::Category => "category",
            RecordKind::Profile => "profile",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" | "products" => Ok(RecordKind::Product),
            "variant" | "variants" => Ok(RecordKind::Variant),
            "category" | "categories" => Ok(RecordKind::Category),
            "profile" | "profiles" => Ok(RecordKind::Profile),
            other => Err(format!("unknown record kind: {other}")),
        }
    }
}

/// Scalar value stored in a record field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// One record as read from the store: a kind-tagged field map plus the
/// version observed at read time (the optimistic-write guard).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogRecord {
    pub id: RecordId,
    pub kind: RecordKind,
    pub fields: BTreeMap<String, FieldValue>,
    pub version: u64,
}

impl CatalogRecord {
    pub fn new(id: RecordId, kind: RecordKind, version: u64) -> Self {
        Self {
            id,
            kind,
            fields: BTreeMap::new(),
            version,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Text content of a field, `None` for null/absent/non-text.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.field(name).and_then(FieldValue::as_int)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.field(name).and_then(FieldValue::as_bool)
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        self.field(name).and_then(FieldValue::as_list)
    }

    pub fn product(&self) -> Option<ProductView<'_>> {
        (self.kind == RecordKind::Product).then_some(ProductView { record: self })
    }

    pub fn variant(&self) -> Option<VariantView<'_>> {
        (self.kind == RecordKind::Variant).then_some(VariantView { record: self })
    }

    pub fn category(&self) -> Option<CategoryView<'_>> {
        (self.kind == RecordKind::Category).then_some(CategoryView { record: self })
    }

    pub fn profile(&self) -> Option<ProfileView<'_>> {
        (self.kind == RecordKind::Profile).then_some(ProfileView { record: self })
    }
}

/// Typed accessors over a Product's field map.
#[derive(Debug, Clone, Copy)]
pub struct ProductView<'a> {
    record: &'a CatalogRecord,
}

impl<'a> ProductView<'a> {
    pub fn name(&self) -> Option<&'a str> {
        self.record.text("name")
    }

    pub fn slug(&self) -> Option<&'a str> {
        self.record.text("slug")
    }

    pub fn base_price(&self) -> Option<i64> {
        self.record.int("base_price")
    }

    pub fn images(&self) -> Option<&'a [String]> {
        self.record.list("images")
    }

    pub fn category_id(&self) -> Option<&'a str> {
        self.record.text("category_id")
    }

    pub fn is_active(&self) -> bool {
        self.record.bool("is_active").unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VariantView<'a> {
    record: &'a CatalogRecord,
}

impl<'a> VariantView<'a> {
    pub fn product_id(&self) -> Option<&'a str> {
        self.record.text("product_id")
    }

    pub fn sku(&self) -> Option<&'a str> {
        self.record.text("sku")
    }

    pub fn size(&self) -> Option<&'a str> {
        self.record.text("size")
    }

    pub fn color(&self) -> Option<&'a str> {
        self.record.text("color")
    }

    pub fn stock_quantity(&self) -> Option<i64> {
        self.record.int("stock_quantity")
    }

    pub fn is_active(&self) -> bool {
        self.record.bool("is_active").unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CategoryView<'a> {
    record: &'a CatalogRecord,
}

impl<'a> CategoryView<'a> {
    pub fn name(&self) -> Option<&'a str> {
        self.record.text("name")
    }

    pub fn slug(&self) -> Option<&'a str> {
        self.record.text("slug")
    }

    pub fn sort_order(&self) -> Option<i64> {
        self.record.int("sort_order")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileView<'a> {
    record: &'a CatalogRecord,
}

impl<'a> ProfileView<'a> {
    pub fn email(&self) -> Option<&'a str> {
        self.record.text("email")
    }

    pub fn role(&self) -> Option<Role> {
        self.record.text("role").and_then(|s| s.parse().ok())
    }

    pub fn raw_role(&self) -> Option<&'a FieldValue> {
        self.record.field("role")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
