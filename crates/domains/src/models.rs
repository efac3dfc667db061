//! # Domain Models
//!
//! Flat records as they are stored in the relational service. Column names
//! are kept verbatim through serde renames, so a row fetched as JSON decodes
//! straight into these structs.
//!
//! Bilingual entities keep independent `_en` / `_km` columns. There is no
//! fallback between languages: a missing translation reads as `""`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// UI language. English is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Km,
}

impl Language {
    /// Column suffix used by bilingual fields.
    pub fn suffix(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Km => "km",
        }
    }

    pub fn pick<'a>(self, en: &'a str, km: &'a str) -> &'a str {
        match self {
            Language::En => en,
            Language::Km => km,
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Language::En => Language::Km,
            Language::Km => Language::En,
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "km" | "kh" => Ok(Language::Km),
            other => Err(format!("unsupported language '{other}'")),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A record that lives in a named table and is addressed by `id`.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn id(&self) -> &str;
}

/// Tolerant decoders for columns the hosted service may return as `null`,
/// as numbers, or in a shape older rows were written with.
mod lenient {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        })
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        })
    }

    /// RFC 3339, or an offset-less datetime taken as UTC. Anything else is
    /// `None` rather than an error for the whole row.
    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Value::String(raw) = Value::deserialize(d)? else {
            return Ok(None);
        };
        let raw = raw.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Some(at.with_timezone(&Utc)));
        }
        Ok(["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc()))
    }

    pub fn list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        })
    }
}

macro_rules! localized {
    ($ty:ty { $($name:ident => ($en:ident, $km:ident)),* $(,)? }) => {
        impl $ty {
            $(
                pub fn $name(&self, lang: Language) -> &str {
                    lang.pick(&self.$en, &self.$km)
                }
            )*
        }
    };
}

/// A photo album shown on the gallery page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GalleryAlbum {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub order: i64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title_en: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title_km: String,
    /// Short excerpt shown on the album card.
    #[serde(default, deserialize_with = "lenient::text")]
    pub description_en: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description_km: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub content_en: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub content_km: String,
    #[serde(rename = "thumbnailUrl", default, deserialize_with = "lenient::text")]
    pub thumbnail_url: String,
    #[serde(rename = "imageUrls", default, deserialize_with = "lenient::list")]
    pub image_urls: Vec<String>,
}

localized!(GalleryAlbum {
    title => (title_en, title_km),
    description => (description_en, description_km),
    content => (content_en, content_km),
});

impl Record for GalleryAlbum {
    const TABLE: &'static str = "gallery";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Teaching {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub order: i64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title_en: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title_km: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub excerpt_en: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub excerpt_km: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub content_en: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub content_km: String,
    #[serde(rename = "thumbnailUrl", default, deserialize_with = "lenient::text")]
    pub thumbnail_url: String,
    #[serde(rename = "imageUrls", default, deserialize_with = "lenient::list")]
    pub image_urls: Vec<String>,
}

localized!(Teaching {
    title => (title_en, title_km),
    excerpt => (excerpt_en, excerpt_km),
    content => (content_en, content_km),
});

impl Record for Teaching {
    const TABLE: &'static str = "teachings";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A temple event. Dates are display strings, never parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub order: i64,
    #[serde(rename = "imgSrc", default, deserialize_with = "lenient::text")]
    pub img_src: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub date_en: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub date_km: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title_en: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title_km: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description_en: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description_km: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub content_en: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub content_km: String,
    #[serde(rename = "imageUrls", default, deserialize_with = "lenient::list")]
    pub image_urls: Vec<String>,
}

localized!(Event {
    date => (date_en, date_km),
    title => (title_en, title_km),
    description => (description_en, description_km),
    content => (content_en, content_km),
});

impl Record for Event {
    const TABLE: &'static str = "events";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A news-feed post. Single language; `author` and `timestamp` are stamped
/// once, at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: String,
    /// Markdown body.
    #[serde(default, deserialize_with = "lenient::text")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub author: String,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Record for Post {
    const TABLE: &'static str = "posts";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Who wrote a comment, as they looked when they wrote it.
///
/// This is a copy, not a reference: later profile changes do not rewrite
/// old comments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentAuthor {
    #[serde(default, deserialize_with = "lenient::text")]
    pub uid: String,
    #[serde(rename = "displayName", default, deserialize_with = "lenient::text")]
    pub display_name: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
}

impl CommentAuthor {
    pub fn snapshot(user: &SessionUser) -> Self {
        Self {
            uid: user.id.clone(),
            display_name: user.display_name.clone(),
            photo_url: user.photo_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub text: String,
    #[serde(rename = "createdAt", default, deserialize_with = "lenient::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: CommentAuthor,
}

impl Record for Comment {
    const TABLE: &'static str = "comments";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Slugs of the singleton content pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSlug {
    About,
    Contact,
}

impl PageSlug {
    pub fn as_str(self) -> &'static str {
        match self {
            PageSlug::About => "about",
            PageSlug::Contact => "contact",
        }
    }
}

impl FromStr for PageSlug {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "about" => Ok(PageSlug::About),
            "contact" => Ok(PageSlug::Contact),
            other => Err(format!("unknown page '{other}'")),
        }
    }
}

/// Free-form bilingual content of a singleton page, one row per slug.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl PageContent {
    /// Reads `{field}_{lang}`; absent or non-text columns read as `""`.
    pub fn text(&self, field: &str, lang: Language) -> &str {
        self.fields
            .get(&format!("{field}_{}", lang.suffix()))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
    }

    /// Reads a single-language column such as `phone` or `email`.
    pub fn plain(&self, field: &str) -> &str {
        self.fields
            .get(field)
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
    }
}

impl Record for PageContent {
    const TABLE: &'static str = "pages";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Editor,
    Admin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Elevated capability granted to an external identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    #[serde(deserialize_with = "lenient::text")]
    pub user_id: String,
    pub role: Role,
}

impl Record for UserRole {
    const TABLE: &'static str = "user_roles";

    fn id(&self) -> &str {
        &self.user_id
    }
}

/// The minimal identity the rest of the site sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

/// A session as the authentication provider reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSession {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Provider-specific profile blob (`full_name`, `avatar_url`, ...).
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}
