//! Storage path construction and safety.
//!
//! Every object the platform stores lives under the `cards/` namespace:
//!
//! ```text
//! cards/anon/<sha256(anonymousId)[:16]>/<cardId>/<kind>/<uuid>.<ext>
//! cards/user/<userId>/<cardId>/<kind>/<uuid>.<ext>
//! ```
//!
//! [`normalize_paths`] is the hard safety boundary in front of every bulk
//! delete: no matter what a document claims to reference, nothing outside
//! `cards/` is ever handed to a removal call.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::types::Card;

/// Prefix of the app-owned storage namespace. Only paths under it are
/// ever deletable.
pub const STORAGE_NAMESPACE: &str = "cards/";

/// Hex length of the anonymous namespace hash.
const ANON_HASH_LEN: usize = 16;

/// Namespace segment for an anonymous visitor: the first 16 hex chars of
/// the SHA-256 of their visitor token. The raw token never appears in a
/// storage path.
#[must_use]
pub fn anon_namespace(anonymous_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(anonymous_id.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..ANON_HASH_LEN].to_string()
}

/// Build a fresh object path under an anonymous visitor's namespace.
#[must_use]
pub fn anon_object_path(anonymous_id: &str, card_id: &str, kind: &str, ext: &str) -> String {
    format!(
        "cards/anon/{}/{}/{}/{}.{}",
        anon_namespace(anonymous_id),
        card_id,
        kind,
        Uuid::new_v4(),
        ext
    )
}

/// Build a fresh object path under a user's namespace.
#[must_use]
pub fn user_object_path(user_id: &str, card_id: &str, kind: &str, ext: &str) -> String {
    format!(
        "cards/user/{}/{}/{}/{}.{}",
        user_id,
        card_id,
        kind,
        Uuid::new_v4(),
        ext
    )
}

/// Compute the claim destination for an existing path: the owner segment is
/// swapped for `user/<user_id>`, the tail (card/kind/file) is preserved.
///
/// Returns `None` when the path does not follow the namespace convention;
/// such paths are carried over verbatim by the claim workflow, never
/// dropped or guessed at.
#[must_use]
pub fn rewrite_to_user_namespace(path: &str, user_id: &str) -> Option<String> {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() < 4 || parts[0] != "cards" {
        return None;
    }
    if parts[1] != "anon" && parts[1] != "user" {
        return None;
    }
    if parts[2].is_empty() || parts[3..].iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(format!("cards/user/{}/{}", user_id, parts[3..].join("/")))
}

/// Gather every storage path referenced by a card: gallery items (path and
/// thumb), the upload audit list, and the design image fields. Deduplicated,
/// stable order.
#[must_use]
pub fn collect_card_paths(card: &Card) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();

    for item in &card.gallery {
        if let Some(path) = &item.path {
            paths.insert(path.clone());
        }
        if let Some(path) = &item.thumb_path {
            paths.insert(path.clone());
        }
    }

    for upload in &card.uploads {
        paths.insert(upload.path.clone());
    }

    let design = &card.design;
    for path in [
        &design.background_path,
        &design.background_thumb_path,
        &design.avatar_path,
        &design.logo_path,
    ]
    .into_iter()
    .flatten()
    {
        paths.insert(path.clone());
    }

    paths
}

/// Trim and filter a set of candidate paths down to the ones that are safe
/// to pass to a bulk delete: non-empty and inside the `cards/` namespace.
#[must_use]
pub fn normalize_paths<I, S>(paths: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    paths
        .into_iter()
        .filter_map(|p| {
            let trimmed = p.as_ref().trim();
            if trimmed.is_empty() || !trimmed.starts_with(STORAGE_NAMESPACE) {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GalleryItem, UploadRecord};
    use chrono::Utc;

    #[test]
    fn test_anon_namespace_is_short_hex() {
        let ns = anon_namespace("visitor-token-123");
        assert_eq!(ns.len(), 16);
        assert!(ns.chars().all(|c| c.is_ascii_hexdigit()));
        // Deterministic for the same token.
        assert_eq!(ns, anon_namespace("visitor-token-123"));
        assert_ne!(ns, anon_namespace("visitor-token-124"));
    }

    #[test]
    fn test_object_path_shape() {
        let path = anon_object_path("tok", "card_1", "gallery", "jpg");
        let parts: Vec<&str> = path.split('/').collect();
        assert_eq!(parts.len(), 6);
        assert_eq!(parts[0], "cards");
        assert_eq!(parts[1], "anon");
        assert_eq!(parts[2].len(), 16);
        assert_eq!(parts[3], "card_1");
        assert_eq!(parts[4], "gallery");
        assert!(parts[5].ends_with(".jpg"));

        let path = user_object_path("user_9", "card_1", "avatar", "png");
        assert!(path.starts_with("cards/user/user_9/card_1/avatar/"));
    }

    #[test]
    fn test_rewrite_to_user_namespace() {
        let src = "cards/anon/a1b2c3d4e5f60718/card_1/gallery/img.jpg";
        assert_eq!(
            rewrite_to_user_namespace(src, "user_9").as_deref(),
            Some("cards/user/user_9/card_1/gallery/img.jpg")
        );

        // Already user-owned paths rewrite too (re-claim back-compat data).
        let src = "cards/user/other/card_1/avatar/a.png";
        assert_eq!(
            rewrite_to_user_namespace(src, "user_9").as_deref(),
            Some("cards/user/user_9/card_1/avatar/a.png")
        );
    }

    #[test]
    fn test_rewrite_rejects_malformed_paths() {
        assert_eq!(rewrite_to_user_namespace("avatars/x/y/z", "u"), None);
        assert_eq!(rewrite_to_user_namespace("cards/anon/h", "u"), None);
        assert_eq!(rewrite_to_user_namespace("cards/other/h/c/k/f", "u"), None);
        assert_eq!(rewrite_to_user_namespace("cards/anon//c/k/f", "u"), None);
        assert_eq!(rewrite_to_user_namespace("", "u"), None);
    }

    #[test]
    fn test_collect_card_paths_dedupes() {
        let mut card = Card::new("card_1");
        card.design.avatar_path = Some("cards/anon/h/card_1/avatar/a.png".to_string());
        card.gallery.push(GalleryItem {
            path: Some("cards/anon/h/card_1/gallery/g.jpg".to_string()),
            thumb_path: Some("cards/anon/h/card_1/gallerythumb/g.jpg".to_string()),
            ..GalleryItem::default()
        });
        // Upload audit entry duplicating the gallery path.
        card.uploads.push(UploadRecord {
            kind: "gallery".to_string(),
            path: "cards/anon/h/card_1/gallery/g.jpg".to_string(),
            url: "https://cdn.test/g.jpg".to_string(),
            created_at: Utc::now(),
        });

        let paths = collect_card_paths(&card);
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn test_normalize_paths_enforces_namespace() {
        let input = vec![
            "cards/anon/h/c/gallery/a.jpg",
            "  cards/user/u/c/avatar/b.png  ",
            "../secrets",
            "",
            "   ",
            "https://evil.example.com/cards/x",
            "/etc/passwd",
            "card/not-quite/the-prefix",
        ];

        let normalized = normalize_paths(input);
        assert_eq!(
            normalized,
            vec![
                "cards/anon/h/c/gallery/a.jpg".to_string(),
                "cards/user/u/c/avatar/b.png".to_string(),
            ]
        );
        assert!(normalized.iter().all(|p| p.starts_with(STORAGE_NAMESPACE)));
    }
}
