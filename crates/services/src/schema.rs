//! # Content schema
//!
//! Declarative description of an admin form: which columns exist, how they
//! are edited, which of them receive uploaded images. The builder checks
//! the description once and derives the empty form from it, so the rest of
//! the manager never looks a field up by a name the schema did not declare.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{Language, OrderBy, Row, SessionUser};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A pair of labels for the admin UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Label {
    pub en: &'static str,
    pub km: &'static str,
}

impl Label {
    pub const fn new(en: &'static str, km: &'static str) -> Self {
        Self { en, km }
    }

    pub fn get(&self, lang: Language) -> &'static str {
        lang.pick(self.en, self.km)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text { bilingual: bool },
    Multiline { bilingual: bool },
    Number,
    /// A single URL, typically filled by an image upload.
    Url,
    /// An ordered list of URLs, edited as newline-delimited text.
    UrlList,
}

impl FieldKind {
    fn is_bilingual(self) -> bool {
        matches!(
            self,
            FieldKind::Text { bilingual: true } | FieldKind::Multiline { bilingual: true }
        )
    }

    fn empty_value(self) -> FieldValue {
        match self {
            FieldKind::Number => FieldValue::Number(0),
            FieldKind::UrlList => FieldValue::List(Vec::new()),
            _ => FieldValue::Text(String::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: Label,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn text(name: &'static str, label: Label) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Text { bilingual: false },
        }
    }

    pub const fn multiline(name: &'static str, label: Label) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Multiline { bilingual: false },
        }
    }

    pub const fn number(name: &'static str, label: Label) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Number,
        }
    }

    pub const fn url(name: &'static str, label: Label) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Url,
        }
    }

    pub const fn url_list(name: &'static str, label: Label) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::UrlList,
        }
    }

    /// Splits a text field into independent `_en` / `_km` columns.
    pub const fn bilingual(mut self) -> Self {
        self.kind = match self.kind {
            FieldKind::Text { .. } => FieldKind::Text { bilingual: true },
            FieldKind::Multiline { .. } => FieldKind::Multiline { bilingual: true },
            other => other,
        };
        self
    }

    /// Column names this field occupies.
    pub fn keys(&self) -> Vec<String> {
        if self.kind.is_bilingual() {
            vec![format!("{}_en", self.name), format!("{}_km", self.name)]
        } else {
            vec![self.name.to_string()]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    /// Replaces a `Url` field.
    Single,
    /// Appends to a `UrlList` field.
    Multiple,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFieldSpec {
    pub field: &'static str,
    pub mode: ImageMode,
    /// Folder inside the bucket, without slashes at either end.
    pub folder: &'static str,
    pub required: bool,
}

impl ImageFieldSpec {
    pub const fn single(field: &'static str, folder: &'static str) -> Self {
        Self {
            field,
            mode: ImageMode::Single,
            folder,
            required: false,
        }
    }

    pub const fn multiple(field: &'static str, folder: &'static str) -> Self {
        Self {
            field,
            mode: ImageMode::Multiple,
            folder,
            required: false,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Whether a submit creates a row or updates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    Create,
    Update,
}

/// What a pre-submit hook may consult.
#[derive(Debug, Clone)]
pub struct SubmitContext {
    pub user: Option<SessionUser>,
    pub now: DateTime<Utc>,
}

/// Rewrites the outgoing row right before it is written.
pub type SubmitHook = Arc<dyn Fn(&mut Row, SubmitMode, &SubmitContext) + Send + Sync>;

/// One line of the admin list view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListItem {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub thumbnail: Option<String>,
}

pub type RowSummary = fn(&Row, Language) -> ListItem;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema for {table} declares no fields")]
    NoFields { table: &'static str },

    #[error("column {key} is declared twice")]
    DuplicateKey { key: String },

    #[error("image field {field} does not name a declared field")]
    UnknownImageField { field: &'static str },

    #[error("image field {field} must be a {expected} field")]
    ImageKindMismatch {
        field: &'static str,
        expected: &'static str,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("unknown field {0}")]
    UnknownField(String),

    #[error("{field} expects a whole number, got '{input}'")]
    InvalidNumber { field: String, input: String },

    #[error("{0} requires an image")]
    MissingImage(String),
}

#[derive(Clone)]
pub struct ContentSchema {
    table: &'static str,
    order_by: OrderBy,
    fields: Vec<FieldSpec>,
    images: Vec<ImageFieldSpec>,
    before_submit: Option<SubmitHook>,
    summary: RowSummary,
}

impl fmt::Debug for ContentSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentSchema")
            .field("table", &self.table)
            .field("order_by", &self.order_by)
            .field("fields", &self.fields)
            .field("images", &self.images)
            .field("before_submit", &self.before_submit.is_some())
            .finish()
    }
}

impl ContentSchema {
    pub fn builder(table: &'static str) -> ContentSchemaBuilder {
        ContentSchemaBuilder {
            table,
            order_by: OrderBy::asc("order"),
            fields: Vec::new(),
            images: Vec::new(),
            before_submit: None,
            summary: default_summary,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn order_by(&self) -> &OrderBy {
        &self.order_by
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn images(&self) -> &[ImageFieldSpec] {
        &self.images
    }

    pub fn image(&self, field: &str) -> Option<&ImageFieldSpec> {
        self.images.iter().find(|img| img.field == field)
    }

    pub(crate) fn before_submit(&self) -> Option<&SubmitHook> {
        self.before_submit.as_ref()
    }

    pub fn summarize(&self, row: &Row, lang: Language) -> ListItem {
        (self.summary)(row, lang)
    }

    /// The form every create starts from and every successful submit
    /// returns to.
    pub fn empty_form(&self) -> FormState {
        let values = self
            .fields
            .iter()
            .flat_map(|spec| spec.keys().into_iter().map(move |k| (k, spec.kind.empty_value())))
            .collect();
        FormState {
            id: None,
            values,
            passthrough: Row::new(),
        }
    }

    /// Loads a stored row into a form. Schema columns are coerced to the
    /// declared kind (a list column holding anything but an array becomes
    /// an empty list); every other column rides along untouched.
    pub fn form_from_row(&self, row: &Row) -> FormState {
        let mut form = self.empty_form();
        for spec in &self.fields {
            for key in spec.keys() {
                let value = match (spec.kind, row.get(&key)) {
                    (_, None) => continue,
                    (FieldKind::Number, Some(v)) => FieldValue::Number(json_to_i64(v)),
                    (FieldKind::UrlList, Some(Value::Array(items))) => FieldValue::List(
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect(),
                    ),
                    (FieldKind::UrlList, Some(_)) => FieldValue::List(Vec::new()),
                    (_, Some(Value::String(s))) => FieldValue::Text(s.clone()),
                    (_, Some(Value::Null)) => FieldValue::Text(String::new()),
                    (_, Some(other)) => FieldValue::Text(other.to_string()),
                };
                form.values.insert(key, value);
            }
        }
        form.id = row.get("id").and_then(json_to_id);
        form.passthrough = row
            .iter()
            .filter(|(k, _)| k.as_str() != "id" && !form.values.contains_key(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        form
    }

    /// Rules checked right before a write.
    pub fn validate(&self, form: &FormState) -> Result<(), FormError> {
        for image in self.images.iter().filter(|img| img.required) {
            let empty = match form.values.get(image.field) {
                Some(FieldValue::Text(s)) => s.trim().is_empty(),
                Some(FieldValue::List(items)) => items.is_empty(),
                _ => true,
            };
            if empty {
                return Err(FormError::MissingImage(image.field.to_string()));
            }
        }
        Ok(())
    }
}

pub struct ContentSchemaBuilder {
    table: &'static str,
    order_by: OrderBy,
    fields: Vec<FieldSpec>,
    images: Vec<ImageFieldSpec>,
    before_submit: Option<SubmitHook>,
    summary: RowSummary,
}

impl ContentSchemaBuilder {
    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn image(mut self, spec: ImageFieldSpec) -> Self {
        self.images.push(spec);
        self
    }

    pub fn before_submit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Row, SubmitMode, &SubmitContext) + Send + Sync + 'static,
    {
        self.before_submit = Some(Arc::new(hook));
        self
    }

    pub fn summary(mut self, summary: RowSummary) -> Self {
        self.summary = summary;
        self
    }

    pub fn build(self) -> Result<ContentSchema, SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::NoFields { table: self.table });
        }

        let mut seen = BTreeSet::new();
        for key in self.fields.iter().flat_map(FieldSpec::keys) {
            if key == "id" || !seen.insert(key.clone()) {
                return Err(SchemaError::DuplicateKey { key });
            }
        }

        for image in &self.images {
            let spec = self
                .fields
                .iter()
                .find(|f| f.name == image.field)
                .ok_or(SchemaError::UnknownImageField { field: image.field })?;
            let (ok, expected) = match image.mode {
                ImageMode::Single => (spec.kind == FieldKind::Url, "url"),
                ImageMode::Multiple => (spec.kind == FieldKind::UrlList, "url list"),
            };
            if !ok {
                return Err(SchemaError::ImageKindMismatch {
                    field: image.field,
                    expected,
                });
            }
        }

        Ok(ContentSchema {
            table: self.table,
            order_by: self.order_by,
            fields: self.fields,
            images: self.images,
            before_submit: self.before_submit,
            summary: self.summary,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(i64),
    List(Vec<String>),
}

impl FieldValue {
    fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Number(n) => Value::from(*n),
            FieldValue::List(items) => Value::from(items.clone()),
        }
    }
}

/// The editable record behind an admin form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormState {
    id: Option<String>,
    values: BTreeMap<String, FieldValue>,
    /// Columns outside the schema (e.g. a post's `author`), written back
    /// unchanged on update.
    #[serde(skip)]
    passthrough: Row,
}

impl FormState {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_editing(&self) -> bool {
        self.id.is_some()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    pub fn text(&self, key: &str) -> &str {
        match self.values.get(key) {
            Some(FieldValue::Text(s)) => s,
            _ => "",
        }
    }

    pub fn list(&self, key: &str) -> &[String] {
        match self.values.get(key) {
            Some(FieldValue::List(items)) => items,
            _ => &[],
        }
    }

    /// Applies raw input from a form control to the matching field.
    /// List fields take newline-delimited text; blank lines are dropped.
    pub fn set_input(&mut self, key: &str, input: &str) -> Result<(), FormError> {
        let slot = self
            .values
            .get_mut(key)
            .ok_or_else(|| FormError::UnknownField(key.to_string()))?;
        *slot = match &*slot {
            FieldValue::Text(_) => FieldValue::Text(input.to_string()),
            FieldValue::Number(_) => {
                let trimmed = input.trim();
                let n = if trimmed.is_empty() {
                    0
                } else {
                    trimmed.parse().map_err(|_| FormError::InvalidNumber {
                        field: key.to_string(),
                        input: input.to_string(),
                    })?
                };
                FieldValue::Number(n)
            }
            FieldValue::List(_) => FieldValue::List(
                input
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        };
        Ok(())
    }

    /// Applies a submitted JSON form body. Strings are taken as typed
    /// input, numbers as their decimal text and string arrays as one entry
    /// per line. `id` is ignored: edit mode only comes from a stored row.
    pub fn fill(&mut self, input: &Row) -> Result<(), FormError> {
        for (key, value) in input {
            if key == "id" {
                continue;
            }
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("\n"),
                other => other.to_string(),
            };
            self.set_input(key, &text)?;
        }
        Ok(())
    }

    /// The newline-delimited text a list field is edited as.
    pub fn list_as_text(&self, key: &str) -> String {
        self.list(key).join("\n")
    }

    pub(crate) fn set_url(&mut self, key: &str, url: String) -> Result<(), FormError> {
        match self.values.get_mut(key) {
            Some(FieldValue::Text(current)) => {
                *current = url;
                Ok(())
            }
            _ => Err(FormError::UnknownField(key.to_string())),
        }
    }

    pub(crate) fn append_urls(&mut self, key: &str, urls: Vec<String>) -> Result<(), FormError> {
        match self.values.get_mut(key) {
            Some(FieldValue::List(items)) => {
                items.extend(urls);
                Ok(())
            }
            _ => Err(FormError::UnknownField(key.to_string())),
        }
    }

    /// The outgoing row, without `id`.
    pub fn to_row(&self) -> Row {
        let mut row = self.passthrough.clone();
        for (key, value) in &self.values {
            row.insert(key.clone(), value.to_json());
        }
        row
    }
}

fn json_to_i64(v: &Value) -> i64 {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

pub(crate) fn json_to_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a text column for list rendering.
pub fn row_text<'a>(row: &'a Row, key: &str) -> &'a str {
    row.get(key).and_then(Value::as_str).unwrap_or("")
}

fn default_summary(row: &Row, lang: Language) -> ListItem {
    let localized = format!("title_{}", lang.suffix());
    let title = match row_text(row, &localized) {
        "" => row_text(row, "title"),
        t => t,
    };
    ListItem {
        id: row.get("id").and_then(json_to_id).unwrap_or_default(),
        title: title.to_string(),
        subtitle: String::new(),
        thumbnail: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn album_schema() -> ContentSchema {
        ContentSchema::builder("gallery")
            .field(FieldSpec::number("order", Label::new("Order", "លំដាប់")))
            .field(FieldSpec::text("title", Label::new("Title", "ចំណងជើង")).bilingual())
            .field(FieldSpec::url("thumbnailUrl", Label::new("Thumbnail", "រូបតំណាង")))
            .field(FieldSpec::url_list("imageUrls", Label::new("Images", "រូបភាព")))
            .image(ImageFieldSpec::single("thumbnailUrl", "gallery/thumbnails").required())
            .image(ImageFieldSpec::multiple("imageUrls", "gallery"))
            .build()
            .unwrap()
    }

    fn row(v: serde_json::Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn builder_expands_bilingual_columns_into_template() {
        let form = album_schema().empty_form();
        assert_eq!(form.get("title_en"), Some(&FieldValue::Text(String::new())));
        assert_eq!(form.get("title_km"), Some(&FieldValue::Text(String::new())));
        assert_eq!(form.get("order"), Some(&FieldValue::Number(0)));
        assert_eq!(form.get("title"), None);
        assert!(!form.is_editing());
    }

    #[test]
    fn builder_rejects_inconsistent_schemas() {
        let dup = ContentSchema::builder("t")
            .field(FieldSpec::text("title", Label::new("a", "a")).bilingual())
            .field(FieldSpec::text("title_en", Label::new("b", "b")))
            .build();
        assert_eq!(
            dup.unwrap_err(),
            SchemaError::DuplicateKey {
                key: "title_en".into()
            }
        );

        let mismatch = ContentSchema::builder("t")
            .field(FieldSpec::text("cover", Label::new("a", "a")))
            .image(ImageFieldSpec::single("cover", "x"))
            .build();
        assert!(matches!(mismatch, Err(SchemaError::ImageKindMismatch { .. })));

        let unknown = ContentSchema::builder("t")
            .field(FieldSpec::url("cover", Label::new("a", "a")))
            .image(ImageFieldSpec::multiple("gallery", "x"))
            .build();
        assert!(matches!(unknown, Err(SchemaError::UnknownImageField { .. })));
    }

    #[test]
    fn list_input_is_split_on_newlines() {
        let mut form = album_schema().empty_form();
        form.set_input("imageUrls", "https://a/1.jpg\n\n  https://a/2.jpg  \n")
            .unwrap();
        assert_eq!(form.list("imageUrls"), ["https://a/1.jpg", "https://a/2.jpg"]);
        assert_eq!(form.list_as_text("imageUrls"), "https://a/1.jpg\nhttps://a/2.jpg");
    }

    #[test]
    fn unknown_and_malformed_input_is_rejected() {
        let mut form = album_schema().empty_form();
        assert_eq!(
            form.set_input("title", "x"),
            Err(FormError::UnknownField("title".into()))
        );
        assert!(matches!(
            form.set_input("order", "first"),
            Err(FormError::InvalidNumber { .. })
        ));
        form.set_input("order", " 7 ").unwrap();
        assert_eq!(form.get("order"), Some(&FieldValue::Number(7)));
    }

    #[test]
    fn loading_a_row_normalizes_lists_and_keeps_other_columns() {
        let schema = album_schema();
        let form = schema.form_from_row(&row(json!({
            "id": 9,
            "order": 2,
            "title_en": "Kathina",
            "imageUrls": "https://legacy/one.jpg",
            "created_by": "abbot",
        })));

        assert_eq!(form.id(), Some("9"));
        assert!(form.list("imageUrls").is_empty());
        assert_eq!(form.text("title_km"), "");

        let out = form.to_row();
        assert_eq!(out.get("created_by"), Some(&json!("abbot")));
        assert_eq!(out.get("imageUrls"), Some(&json!([])));
        assert!(!out.contains_key("id"));
    }

    #[test]
    fn required_image_is_enforced() {
        let schema = album_schema();
        let mut form = schema.empty_form();
        assert_eq!(
            schema.validate(&form),
            Err(FormError::MissingImage("thumbnailUrl".into()))
        );
        form.set_input("thumbnailUrl", "https://a/t.jpg").unwrap();
        assert_eq!(schema.validate(&form), Ok(()));
    }
}
