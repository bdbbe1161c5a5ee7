//! Read-only queries over the externally-ingested `posts` table.
//!
//! Posts carry optional pre-computed features: sentiment, complaint flag,
//! saas score, pain points, a fixed-length embedding, and pairwise
//! similarity edges. The JSON-shaped columns are stored as TEXT and parsed
//! leniently here: a malformed column degrades to `None` rather than
//! failing the whole select.

use std::collections::HashMap;

use super::DbPool;
use crate::error::StorageError;

/// Sentinel platform value that disables the platform filter.
pub const ALL_PLATFORMS: &str = "all";

/// One pre-computed similarity edge from a post to another post.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SimilarityEdge {
    /// The other endpoint of the edge.
    pub other_post_id: i64,
    /// Cosine similarity in `0..=1`.
    pub score: f64,
}

/// A social-media post as seen by the pipeline.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Post {
    /// Store-assigned integer id.
    pub id: i64,
    /// Source platform (e.g. "reddit", "hackernews").
    pub platform: String,
    /// ISO-8601 UTC creation timestamp.
    pub created_at: String,
    /// Post title.
    pub title: String,
    /// Post body text.
    pub body: String,
    /// Sentiment in `-1..=1`.
    pub sentiment: f64,
    /// Whether ingestion flagged this post as a complaint.
    pub is_complaint: bool,
    /// Pre-computed commercial-viability score in `0..=100`, if scored.
    pub saas_score: Option<f64>,
    /// Short pain-point phrases extracted at ingestion time.
    pub pain_points: Option<Vec<String>>,
    /// Pairwise similarity edges to other posts.
    pub similarity_scores: Option<Vec<SimilarityEdge>>,
    /// Fixed-length embedding vector.
    pub embedding: Option<Vec<f64>>,
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    platform: String,
    created_at: String,
    title: Option<String>,
    body: Option<String>,
    sentiment: f64,
    is_complaint: i64,
    saas_score: Option<f64>,
    pain_points: Option<String>,
    similarity_scores: Option<String>,
    embedding: Option<String>,
}

fn parse_json_column<T: serde::de::DeserializeOwned>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|s| serde_json::from_str(s).ok())
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            platform: row.platform,
            created_at: row.created_at,
            title: row.title.unwrap_or_default(),
            body: row.body.unwrap_or_default(),
            sentiment: row.sentiment,
            is_complaint: row.is_complaint != 0,
            saas_score: row.saas_score,
            pain_points: parse_json_column(row.pain_points.as_deref()),
            similarity_scores: parse_json_column(row.similarity_scores.as_deref()),
            embedding: parse_json_column(row.embedding.as_deref()),
        }
    }
}

/// Select candidate posts for one job.
///
/// Returns posts with non-null title, body, and embedding created at or
/// after `since`, ordered `saas_score DESC NULLS LAST, created_at DESC`.
/// `platform == "all"` disables the platform filter. When
/// `min_saas_score` is set, scored posts below it are dropped; unscored
/// posts are kept for the heuristic classification path.
pub async fn select_posts(
    pool: &DbPool,
    platform: &str,
    since: &str,
    min_saas_score: Option<f64>,
    limit: u32,
) -> Result<Vec<Post>, StorageError> {
    let rows: Vec<PostRow> = sqlx::query_as(
        "SELECT id, platform, created_at, title, body, sentiment, is_complaint, \
                saas_score, pain_points, similarity_scores, embedding \
         FROM posts \
         WHERE title IS NOT NULL AND body IS NOT NULL AND embedding IS NOT NULL \
           AND created_at >= ?1 \
           AND (?2 = 'all' OR platform = ?2) \
           AND (?3 IS NULL OR saas_score IS NULL OR saas_score >= ?3) \
         ORDER BY saas_score DESC NULLS LAST, created_at DESC \
         LIMIT ?4",
    )
    .bind(since)
    .bind(platform)
    .bind(min_saas_score)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows.into_iter().map(Post::from).collect())
}

/// Fetch similarity edges for a set of posts.
///
/// Returns a map from post id to its edge list. Posts with no stored
/// similarity rows are absent from the map and contribute no edges.
pub async fn select_similarity_rows(
    pool: &DbPool,
    post_ids: &[i64],
) -> Result<HashMap<i64, Vec<SimilarityEdge>>, StorageError> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }

    // SQLite has no array bind; build the placeholder list by hand.
    let placeholders = vec!["?"; post_ids.len()].join(", ");
    let sql = format!(
        "SELECT id, similarity_scores FROM posts \
         WHERE similarity_scores IS NOT NULL AND id IN ({placeholders})"
    );

    let mut query = sqlx::query_as::<_, (i64, String)>(&sql);
    for id in post_ids {
        query = query.bind(id);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    let mut edges = HashMap::with_capacity(rows.len());
    for (id, raw) in rows {
        if let Some(list) = parse_json_column::<Vec<SimilarityEdge>>(Some(&raw)) {
            edges.insert(id, list);
        }
    }
    Ok(edges)
}

/// Insert a post fixture. Test-only: production posts come from ingestion.
#[cfg(any(test, feature = "test-helpers"))]
pub async fn insert_post(pool: &DbPool, post: &Post) -> Result<(), StorageError> {
    let pain_points = post
        .pain_points
        .as_ref()
        .map(|v| serde_json::to_string(v).unwrap_or_default());
    let similarity = post
        .similarity_scores
        .as_ref()
        .map(|v| serde_json::to_string(v).unwrap_or_default());
    let embedding = post
        .embedding
        .as_ref()
        .map(|v| serde_json::to_string(v).unwrap_or_default());

    sqlx::query(
        "INSERT INTO posts (id, platform, created_at, title, body, sentiment, is_complaint, \
                            saas_score, pain_points, similarity_scores, embedding) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(post.id)
    .bind(&post.platform)
    .bind(&post.created_at)
    .bind(&post.title)
    .bind(&post.body)
    .bind(post.sentiment)
    .bind(i64::from(post.is_complaint))
    .bind(post.saas_score)
    .bind(pain_points)
    .bind(similarity)
    .bind(embedding)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;
    Ok(())
}

#[cfg(any(test, feature = "test-helpers"))]
impl Post {
    /// A minimal valid fixture post for tests.
    pub fn fixture(id: i64, platform: &str, created_at: &str) -> Self {
        Post {
            id,
            platform: platform.to_string(),
            created_at: created_at.to_string(),
            title: format!("post {id} title"),
            body: format!("post {id} body"),
            sentiment: 0.0,
            is_complaint: false,
            saas_score: None,
            pain_points: None,
            similarity_scores: None,
            embedding: Some(vec![0.0, 0.0, 0.0]),
        }
    }
}
