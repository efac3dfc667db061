//! # Public pages
//!
//! View models for the visitor-facing site. Each page runs one or two
//! fetchers and pairs the outcome with static bilingual copy. Content is
//! shown in the requested language only; a missing translation is an empty
//! string, never the other language.

use std::sync::Arc;

use chrono::SecondsFormat;
use domains::{
    Clock, Comment, CommentAuthor, DataClient, DataError, Event, FetchOptions, GalleryAlbum,
    Language, OrderBy, PageContent, PageSlug, Post, Record, Row, SessionUser, Teaching,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::fetch::{decode, CollectionFetcher, DocumentFetcher, FetchError, FetchState};
use crate::schema::Label;
use crate::search::{search, SearchOutcome, SearchSources};

const COMMENT_MAX_CHARS: usize = 2000;

mod copy {
    use crate::schema::Label;

    pub const FEED: Label = Label::new("News", "ព័ត៌មាន");
    pub const GALLERY: Label = Label::new("Gallery", "វិចិត្រសាល");
    pub const GALLERY_INTRO: Label = Label::new(
        "Moments from temple life and ceremonies.",
        "ព្រឹត្តិការណ៍ និងពិធីបុណ្យនានានៅវត្ត។",
    );
    pub const EVENTS: Label = Label::new("Events", "ព្រឹត្តិការណ៍");
    pub const EVENTS_INTRO: Label = Label::new(
        "Ceremonies and gatherings through the year.",
        "ពិធីបុណ្យ និងការជួបជុំពេញមួយឆ្នាំ។",
    );
    pub const TEACHINGS: Label = Label::new("Teachings", "ធម្មទេសនា");
    pub const TEACHINGS_INTRO: Label = Label::new(
        "Dhamma talks and reflections.",
        "ធម្មទេសនា និងការពិចារណា។",
    );
    pub const ABOUT: Label = Label::new("About the temple", "អំពីវត្ត");
    pub const CONTACT: Label = Label::new("Contact", "ទំនាក់ទំនង");
    pub const COMMENTS: Label = Label::new("Comments", "មតិយោបល់");
    pub const SEARCH: Label = Label::new("Search", "ស្វែងរក");
    pub const NOT_FOUND: Label = Label::new("This page could not be found.", "រកមិនឃើញទំព័រនេះទេ។");
    pub const LOAD_FAILED: Label = Label::new(
        "Something went wrong while loading. Please try again.",
        "មានបញ្ហាក្នុងការផ្ទុក។ សូមព្យាយាមម្តងទៀត។",
    );
}

/// The body of a page, or why there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    Ready(T),
    Loading,
    NotFound { message: String },
    Failed { message: String, reason: String },
}

impl<T> Section<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Section::NotFound { .. })
    }
}

fn collection<U, V>(state: FetchState<Vec<U>>, lang: Language, map: impl Fn(&U) -> V) -> Section<Vec<V>> {
    match state.error {
        Some(e) => Section::Failed {
            message: copy::LOAD_FAILED.get(lang).to_string(),
            reason: e.to_string(),
        },
        None if state.loading => Section::Loading,
        None => Section::Ready(state.data.iter().map(map).collect()),
    }
}

fn document<U, V>(state: FetchState<Option<U>>, lang: Language, map: impl FnOnce(&U) -> V) -> Section<V> {
    match (state.data, state.error) {
        (Some(doc), _) => Section::Ready(map(&doc)),
        (None, Some(FetchError::NotFound | FetchError::MissingId)) => Section::NotFound {
            message: copy::NOT_FOUND.get(lang).to_string(),
        },
        (None, Some(e)) => Section::Failed {
            message: copy::LOAD_FAILED.get(lang).to_string(),
            reason: e.to_string(),
        },
        (None, None) => Section::Loading,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView<T> {
    pub lang: Language,
    pub heading: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<&'static str>,
    pub section: Section<T>,
}

impl<T> PageView<T> {
    fn new(lang: Language, heading: Label, intro: Option<Label>, section: Section<T>) -> Self {
        Self {
            lang,
            heading: heading.get(lang),
            intro: intro.map(|l| l.get(lang)),
            section,
        }
    }
}

/// A tile on a list page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub id: String,
    pub title: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub image: String,
    pub link: String,
}

/// A detail page for an album, event or teaching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detail {
    pub id: String,
    pub title: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Markdown body.
    pub content: String,
    pub cover: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AboutView {
    pub headline: String,
    pub history: String,
    pub mission: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactView {
    pub address: String,
    pub hours: String,
    pub phone: String,
    pub email: String,
    #[serde(rename = "mapUrl")]
    pub map_url: String,
}

fn album_card(a: &GalleryAlbum, lang: Language) -> Card {
    Card {
        id: a.id.clone(),
        title: a.title(lang).to_string(),
        summary: a.description(lang).to_string(),
        date: None,
        image: a.thumbnail_url.clone(),
        link: format!("/gallery/{}", a.id),
    }
}

fn event_card(e: &Event, lang: Language) -> Card {
    Card {
        id: e.id.clone(),
        title: e.title(lang).to_string(),
        summary: e.description(lang).to_string(),
        date: Some(e.date(lang).to_string()),
        image: e.img_src.clone(),
        link: format!("/events/{}", e.id),
    }
}

fn teaching_card(t: &Teaching, lang: Language) -> Card {
    Card {
        id: t.id.clone(),
        title: t.title(lang).to_string(),
        summary: t.excerpt(lang).to_string(),
        date: None,
        image: t.thumbnail_url.clone(),
        link: format!("/teachings/{}", t.id),
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommentError {
    #[error("sign in to comment")]
    SignInRequired,

    #[error("comment is empty")]
    Empty,

    #[error("comment is longer than {max} characters")]
    TooLong { max: usize },

    #[error("could not post comment: {0}")]
    Write(#[source] DataError),
}

/// Read side of the public site plus comment posting.
#[derive(Clone)]
pub struct Site {
    client: Arc<dyn DataClient>,
    clock: Arc<dyn Clock>,
}

impl Site {
    pub fn new(client: Arc<dyn DataClient>, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }

    async fn list<T: Record>(&self, order_by: OrderBy) -> FetchState<Vec<T>> {
        CollectionFetcher::<T>::new(Arc::clone(&self.client), T::TABLE, FetchOptions::ordered(order_by))
            .fetch()
            .await
    }

    async fn one<T: Record>(&self, id: &str) -> FetchState<Option<T>> {
        DocumentFetcher::<T>::new(Arc::clone(&self.client), T::TABLE, id)
            .fetch()
            .await
    }

    /// News feed, newest first.
    pub async fn feed(&self, lang: Language) -> PageView<Vec<Post>> {
        let state = self.list::<Post>(OrderBy::desc("timestamp")).await;
        PageView::new(lang, copy::FEED, None, collection(state, lang, Post::clone))
    }

    pub async fn gallery(&self, lang: Language) -> PageView<Vec<Card>> {
        let state = self.list::<GalleryAlbum>(OrderBy::asc("order")).await;
        let section = collection(state, lang, |a| album_card(a, lang));
        PageView::new(lang, copy::GALLERY, Some(copy::GALLERY_INTRO), section)
    }

    pub async fn album(&self, id: &str, lang: Language) -> PageView<Detail> {
        let state = self.one::<GalleryAlbum>(id).await;
        let section = document(state, lang, |a| Detail {
            id: a.id.clone(),
            title: a.title(lang).to_string(),
            summary: a.description(lang).to_string(),
            date: None,
            content: a.content(lang).to_string(),
            cover: a.thumbnail_url.clone(),
            images: a.image_urls.clone(),
        });
        PageView::new(lang, copy::GALLERY, None, section)
    }

    pub async fn events(&self, lang: Language) -> PageView<Vec<Card>> {
        let state = self.list::<Event>(OrderBy::asc("order")).await;
        let section = collection(state, lang, |e| event_card(e, lang));
        PageView::new(lang, copy::EVENTS, Some(copy::EVENTS_INTRO), section)
    }

    pub async fn event(&self, id: &str, lang: Language) -> PageView<Detail> {
        let state = self.one::<Event>(id).await;
        let section = document(state, lang, |e| Detail {
            id: e.id.clone(),
            title: e.title(lang).to_string(),
            summary: e.description(lang).to_string(),
            date: Some(e.date(lang).to_string()),
            content: e.content(lang).to_string(),
            cover: e.img_src.clone(),
            images: e.image_urls.clone(),
        });
        PageView::new(lang, copy::EVENTS, None, section)
    }

    pub async fn teachings(&self, lang: Language) -> PageView<Vec<Card>> {
        let state = self.list::<Teaching>(OrderBy::asc("order")).await;
        let section = collection(state, lang, |t| teaching_card(t, lang));
        PageView::new(lang, copy::TEACHINGS, Some(copy::TEACHINGS_INTRO), section)
    }

    pub async fn teaching(&self, id: &str, lang: Language) -> PageView<Detail> {
        let state = self.one::<Teaching>(id).await;
        let section = document(state, lang, |t| Detail {
            id: t.id.clone(),
            title: t.title(lang).to_string(),
            summary: t.excerpt(lang).to_string(),
            date: None,
            content: t.content(lang).to_string(),
            cover: t.thumbnail_url.clone(),
            images: t.image_urls.clone(),
        });
        PageView::new(lang, copy::TEACHINGS, None, section)
    }

    pub async fn about(&self, lang: Language) -> PageView<AboutView> {
        let state = self.one::<PageContent>(PageSlug::About.as_str()).await;
        let section = document(state, lang, |p| AboutView {
            headline: p.text("headline", lang).to_string(),
            history: p.text("history", lang).to_string(),
            mission: p.text("mission", lang).to_string(),
            image_url: p.plain("imageUrl").to_string(),
        });
        PageView::new(lang, copy::ABOUT, None, section)
    }

    pub async fn contact(&self, lang: Language) -> PageView<ContactView> {
        let state = self.one::<PageContent>(PageSlug::Contact.as_str()).await;
        let section = document(state, lang, |p| ContactView {
            address: p.text("address", lang).to_string(),
            hours: p.text("hours", lang).to_string(),
            phone: p.plain("phone").to_string(),
            email: p.plain("email").to_string(),
            map_url: p.plain("mapUrl").to_string(),
        });
        PageView::new(lang, copy::CONTACT, None, section)
    }

    /// Comments, newest first.
    pub async fn comments(&self, lang: Language) -> PageView<Vec<Comment>> {
        let state = self.list::<Comment>(OrderBy::desc("createdAt")).await;
        PageView::new(lang, copy::COMMENTS, None, collection(state, lang, Comment::clone))
    }

    /// Stores a comment under a snapshot of the author's current profile.
    pub async fn post_comment(&self, user: Option<&SessionUser>, text: &str) -> Result<Comment, CommentError> {
        let user = user.ok_or(CommentError::SignInRequired)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(CommentError::Empty);
        }
        if text.chars().count() > COMMENT_MAX_CHARS {
            return Err(CommentError::TooLong {
                max: COMMENT_MAX_CHARS,
            });
        }

        let author = CommentAuthor::snapshot(user);
        let mut row = Row::new();
        row.insert("text".into(), text.into());
        row.insert(
            "createdAt".into(),
            self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true).into(),
        );
        row.insert(
            "user".into(),
            serde_json::to_value(&author).map_err(|e| CommentError::Write(DataError::backend(Comment::TABLE, e)))?,
        );

        let stored = self.client.insert(Comment::TABLE, row).await.map_err(|e| {
            error!(user = %user.id, error = %e, "comment write failed");
            CommentError::Write(e)
        })?;
        let comment: Comment = decode(Comment::TABLE, stored).map_err(CommentError::Write)?;
        info!(user = %user.id, id = %comment.id, "comment posted");
        Ok(comment)
    }

    /// Loads the four searchable collections and runs `query` over them.
    /// A collection that fails to load is searched as empty.
    pub async fn search(&self, query: &str, lang: Language) -> PageView<SearchOutcome> {
        let (posts, events, teachings, albums) = tokio::join!(
            self.list::<Post>(OrderBy::desc("timestamp")),
            self.list::<Event>(OrderBy::asc("order")),
            self.list::<Teaching>(OrderBy::asc("order")),
            self.list::<GalleryAlbum>(OrderBy::asc("order")),
        );
        let sources = SearchSources {
            posts: posts.data,
            events: events.data,
            teachings: teachings.data,
            albums: albums.data,
        };
        let outcome = search(query, &sources, lang);
        PageView::new(lang, copy::SEARCH, None, Section::Ready(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domains::{FixedClock, MockDataClient};
    use serde_json::json;
    use storage_adapters::memory::MemoryDataClient;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(chrono::Utc.with_ymd_and_hms(2024, 5, 22, 6, 30, 0).unwrap()))
    }

    fn site() -> (Arc<MemoryDataClient>, Site) {
        let client = Arc::new(MemoryDataClient::new());
        client.seed(
            "events",
            [
                json!({ "id": "e1", "order": 1, "title_en": "Pchum Ben", "date_en": "September" }),
                json!({ "id": "e2", "order": 0, "title_en": "Vesak Bochea", "title_km": "វិសាខបូជា", "date_km": "ខែពិសាខ" }),
            ],
        );
        client.seed(
            "pages",
            [json!({ "id": "about", "headline_en": "Welcome", "history_km": "ប្រវត្តិ" })],
        );
        let site = Site::new(client.clone(), clock());
        (client, site)
    }

    #[tokio::test]
    async fn event_list_is_ordered_and_localized() {
        let (_, site) = site();

        let view = site.events(Language::Km).await;

        assert_eq!(view.heading, "ព្រឹត្តិការណ៍");
        let cards = view.section.ready().unwrap();
        assert_eq!(cards[0].title, "វិសាខបូជា");
        assert_eq!(cards[0].date.as_deref(), Some("ខែពិសាខ"));
        // No fallback to English for a missing translation.
        assert_eq!(cards[1].title, "");
        assert_eq!(cards[1].link, "/events/e1");
    }

    #[tokio::test]
    async fn unknown_detail_is_not_found_not_failed() {
        let (_, site) = site();

        assert!(site.event("missing", Language::En).await.section.is_not_found());
        assert!(site.teaching("", Language::En).await.section.is_not_found());
        assert!(site.contact(Language::En).await.section.is_not_found());
    }

    #[tokio::test]
    async fn about_page_reads_one_language() {
        let (_, site) = site();

        let en = site.about(Language::En).await;
        let en = en.section.ready().unwrap();
        assert_eq!(en.headline, "Welcome");
        assert_eq!(en.history, "");

        let km = site.about(Language::Km).await;
        assert_eq!(km.section.ready().unwrap().history, "ប្រវត្តិ");
    }

    #[tokio::test]
    async fn failed_list_renders_failure_copy() {
        let mut mock = MockDataClient::new();
        mock.expect_select()
            .returning(|table, _| Err(DataError::backend(table, "down")));
        let site = Site::new(Arc::new(mock), clock());

        let view = site.gallery(Language::En).await;

        match view.section {
            Section::Failed { reason, .. } => assert_eq!(reason, "could not load gallery"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn comment_snapshots_the_author() {
        let (client, site) = site();
        let user = SessionUser {
            id: "u1".into(),
            display_name: "Dara".into(),
            photo_url: Some("https://img/dara.png".into()),
        };

        assert_eq!(
            site.post_comment(None, "hello").await,
            Err(CommentError::SignInRequired)
        );
        assert_eq!(site.post_comment(Some(&user), "   ").await, Err(CommentError::Empty));

        let comment = site.post_comment(Some(&user), "  Sadhu!  ").await.unwrap();
        assert_eq!(comment.text, "Sadhu!");
        assert_eq!(comment.user.display_name, "Dara");
        assert!(!comment.id.is_empty());

        let stored = &client.rows("comments")[0];
        assert_eq!(stored["user"]["photoURL"], "https://img/dara.png");
        assert_eq!(stored["createdAt"], "2024-05-22T06:30:00.000Z");

        let listed = site.comments(Language::En).await;
        assert_eq!(listed.section.ready().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_page_runs_over_loaded_collections() {
        let (_, site) = site();

        let view = site.search("VESAK", Language::En).await;

        let hits = view.section.ready().unwrap().hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "e2");
    }
}
