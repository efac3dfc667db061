//! # domains
//!
//! Entities, port traits and error types for the temple site.
//! Nothing in this crate performs I/O; adapters live in sibling crates.

pub mod access;
pub mod errors;
pub mod models;
pub mod ports;

pub use access::*;
pub use errors::*;
pub use models::*;
pub use ports::*;

#[cfg(test)]
mod tests {
    use super::models::*;

    #[test]
    fn album_reads_nulls_and_numeric_ids() {
        let row = serde_json::json!({
            "id": 42,
            "order": 3,
            "title_en": "Kathina",
            "title_km": null,
            "thumbnailUrl": "https://cdn.example/k.jpg",
            "imageUrls": "not-a-list",
        });
        let album: GalleryAlbum = serde_json::from_value(row).unwrap();
        assert_eq!(album.id, "42");
        assert_eq!(album.order, 3);
        assert_eq!(album.title_km, "");
        assert!(album.image_urls.is_empty());
        assert_eq!(album.title(Language::Km), "");
        assert_eq!(album.title(Language::En), "Kathina");
    }

    #[test]
    fn timestamps_without_an_offset_are_read_as_utc() {
        let posts: Vec<Post> = serde_json::from_value(serde_json::json!([
            { "id": "p1", "title": "ok", "timestamp": "2024-05-02T08:00:00+07:00" },
            { "id": "p2", "title": "naive", "timestamp": "2024-05-02T08:00:00" },
            { "id": "p3", "title": "spaced", "timestamp": "2024-05-02 08:00:00.250" },
            { "id": "p4", "title": "junk", "timestamp": "yesterday" },
            { "id": "p5", "title": "number", "timestamp": 1714636800 },
        ]))
        .unwrap();

        let stamps: Vec<_> = posts.iter().map(|p| p.timestamp.map(|t| t.to_rfc3339())).collect();
        assert_eq!(
            stamps,
            [
                Some("2024-05-02T01:00:00+00:00".to_string()),
                Some("2024-05-02T08:00:00+00:00".to_string()),
                Some("2024-05-02T08:00:00.250+00:00".to_string()),
                None,
                None,
            ]
        );

        let comment: Comment =
            serde_json::from_value(serde_json::json!({ "id": "c1", "createdAt": "2024-05-02T08:00:00" })).unwrap();
        assert!(comment.created_at.is_some());
    }
}
