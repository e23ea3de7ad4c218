use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::PlannerSettings;
use crate::error::SearchError;
use crate::metrics::{SEARCH_AUGMENTATIONS_EXHAUSTED_TOTAL, SEARCH_REQUESTS_TOTAL};
use crate::models::PerformanceAnalysis;
use crate::services::collaborators::{SearchClient, SearchHit};
use crate::utils::retry::{retry_async_when, RetryConfig};

/// Grounds generation requests in reference material pulled from web search.
///
/// Failures never escape: a topic whose search keeps failing simply
/// contributes nothing to the brief.
pub struct ResourceAugmenter {
    search: Arc<dyn SearchClient>,
    subject: String,
    default_topics: Vec<String>,
    max_topics: usize,
    weak_topic_results: usize,
    default_topic_results: usize,
    snippet_chars: usize,
    retry: RetryConfig,
    inter_topic_delay: Duration,
}

impl ResourceAugmenter {
    pub fn new(search: Arc<dyn SearchClient>, settings: &PlannerSettings) -> Self {
        Self {
            search,
            subject: settings.subject.clone(),
            default_topics: settings.default_topics.clone(),
            max_topics: settings.max_augmented_topics,
            weak_topic_results: settings.weak_topic_results,
            default_topic_results: settings.default_topic_results,
            snippet_chars: settings.snippet_chars,
            retry: RetryConfig::exponential(
                settings.search_max_attempts,
                settings.search_base_backoff,
            ),
            inter_topic_delay: settings.inter_topic_delay,
        }
    }

    /// Topics to search and how many results to ask for each. Weak topics win;
    /// learners without any get the default catalogue.
    pub fn topics_for(&self, analysis: &PerformanceAnalysis) -> Vec<(String, usize)> {
        if analysis.weak_topics.is_empty() {
            self.default_topics
                .iter()
                .take(self.max_topics)
                .map(|topic| (topic.clone(), self.default_topic_results))
                .collect()
        } else {
            analysis
                .weak_topics
                .iter()
                .take(self.max_topics)
                .map(|topic| (topic.clone(), self.weak_topic_results))
                .collect()
        }
    }

    pub async fn augment(&self, analysis: &PerformanceAnalysis) -> String {
        let topics = self.topics_for(analysis);
        info!(topics = ?topics, "Augmenting generation context with web search");

        let mut context = String::new();
        for (index, (topic, num_results)) in topics.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.inter_topic_delay).await;
            }
            context.push_str(&self.search_topic(topic, *num_results).await);
        }
        context
    }

    /// Searches one topic with bounded retries. Returns an empty string when
    /// nothing usable came back.
    pub async fn search_topic(&self, topic: &str, num_results: usize) -> String {
        let query = format!("{} {} practice questions examples", self.subject, topic);
        debug!(%query, "Searching reference material");

        let outcome = retry_async_when(
            self.retry.clone(),
            |_: &SearchError| true,
            || async {
                let result = self.search.search(&query, num_results).await;
                if let Err(err) = &result {
                    let label = if err.is_rate_limited() {
                        "rate_limited"
                    } else {
                        "error"
                    };
                    SEARCH_REQUESTS_TOTAL.with_label_values(&[label]).inc();
                    warn!(topic, error = %err, "Search attempt failed");
                }
                result
            },
        )
        .await;

        match outcome {
            Ok(hits) if hits.is_empty() => {
                SEARCH_REQUESTS_TOTAL.with_label_values(&["empty"]).inc();
                info!(topic, "Search returned no results");
                String::new()
            }
            Ok(hits) => {
                SEARCH_REQUESTS_TOTAL.with_label_values(&["success"]).inc();
                let hits = &hits[..hits.len().min(num_results)];
                info!(topic, found = hits.len(), "Search returned reference material");
                self.render(topic, hits)
            }
            Err(err) => {
                SEARCH_AUGMENTATIONS_EXHAUSTED_TOTAL.inc();
                warn!(
                    topic,
                    attempts = self.retry.max_attempts,
                    error = %err,
                    "Search failed after all retries, skipping topic"
                );
                String::new()
            }
        }
    }

    fn render(&self, topic: &str, hits: &[SearchHit]) -> String {
        let mut block = format!("\n### Reference material for {}:\n", topic);
        for (i, hit) in hits.iter().enumerate() {
            let _ = writeln!(
                block,
                "{}. {}\n   {}",
                i + 1,
                hit.title.trim(),
                truncate_chars(hit.body.trim(), self.snippet_chars)
            );
        }
        block
    }
}

/// Keeps at most `limit` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
