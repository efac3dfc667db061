//! # Content types
//!
//! Schema of every table the admin dashboard edits.

use std::fmt;
use std::str::FromStr;

use chrono::SecondsFormat;
use domains::{Event, GalleryAlbum, Language, OrderBy, Post, Record, Row, Teaching};
use serde::{Deserialize, Serialize};

use crate::schema::{
    json_to_id, row_text, ContentSchema, FieldSpec, ImageFieldSpec, Label, ListItem, SchemaError,
    SubmitMode,
};

/// The four collections edited with the full form machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Posts,
    Gallery,
    Events,
    Teachings,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Posts,
        ContentKind::Gallery,
        ContentKind::Events,
        ContentKind::Teachings,
    ];

    pub fn table(self) -> &'static str {
        match self {
            ContentKind::Posts => Post::TABLE,
            ContentKind::Gallery => GalleryAlbum::TABLE,
            ContentKind::Events => Event::TABLE,
            ContentKind::Teachings => Teaching::TABLE,
        }
    }

    pub fn schema(self) -> Result<ContentSchema, SchemaError> {
        match self {
            ContentKind::Posts => posts(),
            ContentKind::Gallery => gallery(),
            ContentKind::Events => events(),
            ContentKind::Teachings => teachings(),
        }
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "posts" | "feed" => Ok(ContentKind::Posts),
            "gallery" => Ok(ContentKind::Gallery),
            "events" => Ok(ContentKind::Events),
            "teachings" => Ok(ContentKind::Teachings),
            other => Err(format!("unknown content type '{other}'")),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

const ORDER: Label = Label::new("Display order", "លំដាប់បង្ហាញ");
const TITLE: Label = Label::new("Title", "ចំណងជើង");
const DESCRIPTION: Label = Label::new("Short description", "ការពិពណ៌នាខ្លី");
const CONTENT: Label = Label::new("Content", "ខ្លឹមសារ");
const THUMBNAIL: Label = Label::new("Thumbnail", "រូបភាពតំណាង");
const IMAGES: Label = Label::new("Images (one URL per line)", "រូបភាព (មួយបន្ទាត់មួយ)");

fn id_of(row: &Row) -> String {
    row.get("id").and_then(json_to_id).unwrap_or_default()
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn localized<'a>(row: &'a Row, field: &str, lang: Language) -> &'a str {
    row_text(row, &format!("{field}_{}", lang.suffix()))
}

/// News-feed posts. Author and timestamp are stamped once, on create.
pub fn posts() -> Result<ContentSchema, SchemaError> {
    ContentSchema::builder(Post::TABLE)
        .order_by(OrderBy::desc("timestamp"))
        .field(FieldSpec::text("title", TITLE))
        .field(FieldSpec::multiline("content", Label::new("Content (Markdown)", "ខ្លឹមសារ (Markdown)")))
        .field(FieldSpec::url("imageUrl", Label::new("Image", "រូបភាព")))
        .image(ImageFieldSpec::single("imageUrl", "posts"))
        .before_submit(|row, mode, ctx| {
            if mode != SubmitMode::Create {
                return;
            }
            let author = ctx
                .user
                .as_ref()
                .map(|u| u.display_name.clone())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "Admin".to_string());
            row.insert("author".into(), author.into());
            row.insert(
                "timestamp".into(),
                ctx.now.to_rfc3339_opts(SecondsFormat::Millis, true).into(),
            );
        })
        .summary(|row, _| ListItem {
            id: id_of(row),
            title: row_text(row, "title").to_string(),
            subtitle: row_text(row, "author").to_string(),
            thumbnail: non_empty(row_text(row, "imageUrl")),
        })
        .build()
}

pub fn gallery() -> Result<ContentSchema, SchemaError> {
    ContentSchema::builder(GalleryAlbum::TABLE)
        .field(FieldSpec::number("order", ORDER))
        .field(FieldSpec::text("title", TITLE).bilingual())
        .field(FieldSpec::multiline("description", DESCRIPTION).bilingual())
        .field(FieldSpec::multiline("content", CONTENT).bilingual())
        .field(FieldSpec::url("thumbnailUrl", THUMBNAIL))
        .field(FieldSpec::url_list("imageUrls", IMAGES))
        .image(ImageFieldSpec::single("thumbnailUrl", "gallery/thumbnails").required())
        .image(ImageFieldSpec::multiple("imageUrls", "gallery/images"))
        .summary(|row, lang| ListItem {
            id: id_of(row),
            title: localized(row, "title", lang).to_string(),
            subtitle: localized(row, "description", lang).to_string(),
            thumbnail: non_empty(row_text(row, "thumbnailUrl")),
        })
        .build()
}

pub fn events() -> Result<ContentSchema, SchemaError> {
    ContentSchema::builder(Event::TABLE)
        .field(FieldSpec::number("order", ORDER))
        .field(FieldSpec::url("imgSrc", THUMBNAIL))
        .field(FieldSpec::text("date", Label::new("Date", "កាលបរិច្ឆេទ")).bilingual())
        .field(FieldSpec::text("title", TITLE).bilingual())
        .field(FieldSpec::multiline("description", DESCRIPTION).bilingual())
        .field(FieldSpec::multiline("content", CONTENT).bilingual())
        .field(FieldSpec::url_list("imageUrls", IMAGES))
        .image(ImageFieldSpec::single("imgSrc", "events/thumbnails").required())
        .image(ImageFieldSpec::multiple("imageUrls", "events/images"))
        .summary(|row, lang| ListItem {
            id: id_of(row),
            title: localized(row, "title", lang).to_string(),
            subtitle: localized(row, "date", lang).to_string(),
            thumbnail: non_empty(row_text(row, "imgSrc")),
        })
        .build()
}

pub fn teachings() -> Result<ContentSchema, SchemaError> {
    ContentSchema::builder(Teaching::TABLE)
        .field(FieldSpec::number("order", ORDER))
        .field(FieldSpec::text("title", TITLE).bilingual())
        .field(FieldSpec::multiline("excerpt", Label::new("Excerpt", "សេចក្តីសង្ខេប")).bilingual())
        .field(FieldSpec::multiline("content", CONTENT).bilingual())
        .field(FieldSpec::url("thumbnailUrl", THUMBNAIL))
        .field(FieldSpec::url_list("imageUrls", IMAGES))
        .image(ImageFieldSpec::single("thumbnailUrl", "teachings/thumbnails").required())
        .image(ImageFieldSpec::multiple("imageUrls", "teachings/images"))
        .summary(|row, lang| ListItem {
            id: id_of(row),
            title: localized(row, "title", lang).to_string(),
            subtitle: localized(row, "excerpt", lang).to_string(),
            thumbnail: non_empty(row_text(row, "thumbnailUrl")),
        })
        .build()
}

pub fn about_page() -> Result<ContentSchema, SchemaError> {
    ContentSchema::builder("pages")
        .field(FieldSpec::text("headline", Label::new("Headline", "ចំណងជើងធំ")).bilingual())
        .field(FieldSpec::multiline("history", Label::new("History", "ប្រវត្តិ")).bilingual())
        .field(FieldSpec::multiline("mission", Label::new("Mission", "បេសកកម្ម")).bilingual())
        .field(FieldSpec::url("imageUrl", Label::new("Image", "រូបភាព")))
        .image(ImageFieldSpec::single("imageUrl", "pages/about"))
        .build()
}

pub fn contact_page() -> Result<ContentSchema, SchemaError> {
    ContentSchema::builder("pages")
        .field(FieldSpec::multiline("address", Label::new("Address", "អាសយដ្ឋាន")).bilingual())
        .field(FieldSpec::text("hours", Label::new("Visiting hours", "ម៉ោងចូលទស្សនា")).bilingual())
        .field(FieldSpec::text("phone", Label::new("Phone", "ទូរស័ព្ទ")))
        .field(FieldSpec::text("email", Label::new("Email", "អ៊ីមែល")))
        .field(FieldSpec::url("mapUrl", Label::new("Map link", "តំណផែនទី")))
        .build()
}
