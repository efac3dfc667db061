//! # Search
//!
//! Linear, case-insensitive substring search over the four public
//! collections. Bilingual records match on either language; hits are shown
//! in the current UI language. No ranking: hits keep collection order,
//! posts first, then events, teachings and albums.

use domains::{Event, GalleryAlbum, Language, Post, Teaching};
use serde::Serialize;

const SNIPPET_CHARS: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Post,
    Event,
    Teaching,
    Album,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub kind: HitKind,
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub link: String,
}

/// `NoQuery` and `NoResults` are different screens: "type something" versus
/// "nothing matched".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "hits", rename_all = "snake_case")]
pub enum SearchOutcome {
    NoQuery,
    NoResults,
    Results(Vec<SearchHit>),
}

impl SearchOutcome {
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            SearchOutcome::Results(hits) => hits,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSources {
    pub posts: Vec<Post>,
    pub events: Vec<Event>,
    pub teachings: Vec<Teaching>,
    pub albums: Vec<GalleryAlbum>,
}

fn matches(needle: &str, fields: &[&String]) -> bool {
    fields.iter().any(|f| f.to_lowercase().contains(needle))
}

fn snippet(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(SNIPPET_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

pub fn search(query: &str, sources: &SearchSources, lang: Language) -> SearchOutcome {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return SearchOutcome::NoQuery;
    }

    let posts = sources
        .posts
        .iter()
        .filter(|p| matches(&needle, &[&p.title, &p.content]))
        .map(|p| SearchHit {
            kind: HitKind::Post,
            id: p.id.clone(),
            title: p.title.clone(),
            snippet: snippet(&p.content),
            link: format!("/feed#{}", p.id),
        });

    let events = sources
        .events
        .iter()
        .filter(|e| {
            matches(
                &needle,
                &[
                    &e.title_en,
                    &e.title_km,
                    &e.description_en,
                    &e.description_km,
                    &e.content_en,
                    &e.content_km,
                ],
            )
        })
        .map(|e| SearchHit {
            kind: HitKind::Event,
            id: e.id.clone(),
            title: e.title(lang).to_string(),
            snippet: snippet(e.description(lang)),
            link: format!("/events/{}", e.id),
        });

    let teachings = sources
        .teachings
        .iter()
        .filter(|t| {
            matches(
                &needle,
                &[
                    &t.title_en,
                    &t.title_km,
                    &t.excerpt_en,
                    &t.excerpt_km,
                    &t.content_en,
                    &t.content_km,
                ],
            )
        })
        .map(|t| SearchHit {
            kind: HitKind::Teaching,
            id: t.id.clone(),
            title: t.title(lang).to_string(),
            snippet: snippet(t.excerpt(lang)),
            link: format!("/teachings/{}", t.id),
        });

    let albums = sources
        .albums
        .iter()
        .filter(|a| {
            matches(
                &needle,
                &[
                    &a.title_en,
                    &a.title_km,
                    &a.description_en,
                    &a.description_km,
                    &a.content_en,
                    &a.content_km,
                ],
            )
        })
        .map(|a| SearchHit {
            kind: HitKind::Album,
            id: a.id.clone(),
            title: a.title(lang).to_string(),
            snippet: snippet(a.description(lang)),
            link: format!("/gallery/{}", a.id),
        });

    let hits: Vec<_> = posts.chain(events).chain(teachings).chain(albums).collect();
    if hits.is_empty() {
        SearchOutcome::NoResults
    } else {
        SearchOutcome::Results(hits)
    }
}

/// Search screen state. Any change to the query, the language or a source
/// collection recomputes the outcome on the spot.
#[derive(Debug, Clone)]
pub struct SearchPage {
    query: String,
    lang: Language,
    sources: SearchSources,
    outcome: SearchOutcome,
}

impl SearchPage {
    pub fn new(lang: Language) -> Self {
        Self {
            query: String::new(),
            lang,
            sources: SearchSources::default(),
            outcome: SearchOutcome::NoQuery,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn outcome(&self) -> &SearchOutcome {
        &self.outcome
    }

    pub fn set_query(&mut self, query: impl Into<String>) -> &SearchOutcome {
        self.query = query.into();
        self.recompute()
    }

    pub fn set_language(&mut self, lang: Language) -> &SearchOutcome {
        self.lang = lang;
        self.recompute()
    }

    pub fn set_sources(&mut self, sources: SearchSources) -> &SearchOutcome {
        self.sources = sources;
        self.recompute()
    }

    pub fn set_posts(&mut self, posts: Vec<Post>) -> &SearchOutcome {
        self.sources.posts = posts;
        self.recompute()
    }

    pub fn set_events(&mut self, events: Vec<Event>) -> &SearchOutcome {
        self.sources.events = events;
        self.recompute()
    }

    pub fn set_teachings(&mut self, teachings: Vec<Teaching>) -> &SearchOutcome {
        self.sources.teachings = teachings;
        self.recompute()
    }

    pub fn set_albums(&mut self, albums: Vec<GalleryAlbum>) -> &SearchOutcome {
        self.sources.albums = albums;
        self.recompute()
    }

    fn recompute(&mut self) -> &SearchOutcome {
        self.outcome = search(&self.query, &self.sources, self.lang);
        &self.outcome
    }
}
