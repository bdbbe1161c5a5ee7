//! Cluster building over pre-computed similarity edges.
//!
//! Opportunity posts are grouped into connected components of the
//! similarity graph at or above a threshold. Edges may pass through posts
//! that are not themselves opportunities (bridge nodes); those merge
//! components but never appear as members. Components below the minimum
//! size are dropped.

mod union_find;

use std::collections::HashMap;

use crate::classify::OpportunityPost;
use crate::store::posts::SimilarityEdge;
use union_find::UnionFind;

/// Threshold retried when the configured one yields zero clusters.
pub const FALLBACK_SIMILARITY_THRESHOLD: f64 = 0.1;

/// A group of related opportunity posts.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Identifier unique within the job.
    pub cluster_id: String,
    /// Members ordered by ascending sentiment (most negative first), so
    /// a prefix of this list is the representative sample.
    pub posts: Vec<OpportunityPost>,
    /// Member count.
    pub size: usize,
    /// Element-wise mean of the members' embeddings; empty when no
    /// member carries one.
    pub centroid: Vec<f64>,
    /// Theme sentence, filled by the theme-naming stage.
    pub theme_summary: String,
}

impl Cluster {
    /// The first `limit` representative posts (most negative sentiment
    /// first).
    pub fn representatives(&self, limit: usize) -> &[OpportunityPost] {
        &self.posts[..self.posts.len().min(limit)]
    }

    /// Member post ids.
    pub fn post_ids(&self) -> Vec<i64> {
        self.posts.iter().map(|p| p.post.id).collect()
    }
}

/// Result of cluster building, carrying the threshold that produced it.
#[derive(Debug)]
pub struct ClusterOutcome {
    pub clusters: Vec<Cluster>,
    /// The similarity threshold actually used (the configured value, or
    /// the fallback when the first pass found nothing).
    pub threshold_used: f64,
}

/// Build clusters at `threshold`, retrying once at the fallback threshold
/// when nothing qualifies.
pub fn build_clusters_with_fallback(
    opportunities: Vec<OpportunityPost>,
    similarity: &HashMap<i64, Vec<SimilarityEdge>>,
    threshold: f64,
    min_cluster_size: usize,
) -> ClusterOutcome {
    let clusters = build_clusters(&opportunities, similarity, threshold, min_cluster_size);
    if !clusters.is_empty() || threshold <= FALLBACK_SIMILARITY_THRESHOLD {
        return ClusterOutcome {
            clusters,
            threshold_used: threshold,
        };
    }

    tracing::info!(
        threshold,
        fallback = FALLBACK_SIMILARITY_THRESHOLD,
        "no clusters at configured threshold, retrying at fallback"
    );
    let clusters = build_clusters(
        &opportunities,
        similarity,
        FALLBACK_SIMILARITY_THRESHOLD,
        min_cluster_size,
    );
    ClusterOutcome {
        clusters,
        threshold_used: FALLBACK_SIMILARITY_THRESHOLD,
    }
}

/// Union-find pass over the similarity edges of the opportunity set.
pub fn build_clusters(
    opportunities: &[OpportunityPost],
    similarity: &HashMap<i64, Vec<SimilarityEdge>>,
    threshold: f64,
    min_cluster_size: usize,
) -> Vec<Cluster> {
    if opportunities.is_empty() {
        return Vec::new();
    }

    // Arena indices: members first, bridge endpoints appended lazily.
    let mut index_of: HashMap<i64, usize> = HashMap::with_capacity(opportunities.len());
    let mut forest = UnionFind::new(opportunities.len());
    for (index, opp) in opportunities.iter().enumerate() {
        index_of.insert(opp.post.id, index);
    }

    for opp in opportunities {
        let Some(edges) = similarity.get(&opp.post.id) else {
            continue;
        };
        let a = index_of[&opp.post.id];
        for edge in edges {
            if edge.score < threshold || edge.other_post_id == opp.post.id {
                continue;
            }
            // Unknown endpoints still join the forest: they can bridge
            // two opportunity posts that share no direct edge.
            let b = *index_of
                .entry(edge.other_post_id)
                .or_insert_with(|| forest.push());
            forest.union(a, b);
        }
    }

    // Group members (only members) by root, keeping first-seen root order.
    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut root_order: Vec<usize> = Vec::new();
    for (index, _) in opportunities.iter().enumerate() {
        let root = forest.find(index);
        let entry = groups.entry(root).or_default();
        if entry.is_empty() {
            root_order.push(root);
        }
        entry.push(index);
    }

    let mut kept: Vec<(usize, Vec<usize>)> = root_order
        .into_iter()
        .enumerate()
        .filter_map(|(seen_order, root)| {
            let members = groups.remove(&root)?;
            (members.len() >= min_cluster_size).then_some((seen_order, members))
        })
        .collect();

    // Largest clusters first; ties broken by first-seen root.
    kept.sort_by(|(order_a, members_a), (order_b, members_b)| {
        members_b
            .len()
            .cmp(&members_a.len())
            .then(order_a.cmp(order_b))
    });

    kept.into_iter()
        .enumerate()
        .map(|(cluster_index, (_, member_indices))| {
            let mut posts: Vec<OpportunityPost> = member_indices
                .into_iter()
                .map(|i| opportunities[i].clone())
                .collect();
            posts.sort_by(|a, b| {
                a.post
                    .sentiment
                    .partial_cmp(&b.post.sentiment)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let centroid = centroid_of(&posts);
            Cluster {
                cluster_id: format!("cluster-{}", cluster_index + 1),
                size: posts.len(),
                centroid,
                theme_summary: String::new(),
                posts,
            }
        })
        .collect()
}

/// Element-wise mean of the available embeddings; empty when none.
fn centroid_of(posts: &[OpportunityPost]) -> Vec<f64> {
    let mut sum: Vec<f64> = Vec::new();
    let mut count = 0usize;
    for opp in posts {
        let Some(embedding) = &opp.post.embedding else {
            continue;
        };
        if sum.is_empty() {
            sum = embedding.clone();
            count = 1;
        } else if embedding.len() == sum.len() {
            for (acc, value) in sum.iter_mut().zip(embedding) {
                *acc += value;
            }
            count += 1;
        }
    }
    if count > 0 {
        for value in &mut sum {
            *value /= count as f64;
        }
    }
    sum
}
