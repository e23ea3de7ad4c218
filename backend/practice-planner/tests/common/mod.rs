#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use practice_planner::error::{GenerationError, SearchError};
use practice_planner::models::{
    Attempt, AttemptRecord, Difficulty, GameSessionSummary, TopicDelta, TopicStat, UserAggregate,
};
use practice_planner::services::collaborators::{
    GenerationClient, GenerationRequest, PerformanceStore, SearchClient, SearchHit,
};
use practice_planner::{AgentDeps, LearningAgent, PlannerSettings};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn attempt(topic: &str, is_correct: bool) -> Attempt {
    Attempt {
        question_id: None,
        topic: topic.to_string(),
        difficulty: Difficulty::Medium,
        is_correct,
        time_spent_ms: 30_000,
    }
}

pub fn session_summary(correct: u32, wrong: u32) -> GameSessionSummary {
    GameSessionSummary {
        game_type: "quiz".to_string(),
        score: correct as i64 * 10,
        correct_answers: correct,
        wrong_answers: wrong,
        max_streak: correct.min(3),
        avg_response_time: 12.5,
    }
}

#[derive(Default)]
struct StoreState {
    attempts: Vec<AttemptRecord>,
    topic_stats: BTreeMap<(String, String), TopicStat>,
    sessions: Vec<(String, String, GameSessionSummary)>,
    aggregates: HashMap<String, UserAggregate>,
}

/// In-memory [`PerformanceStore`] with failure injection.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    attempt_insert_budget: Mutex<Option<usize>>,
    forced_conflicts: AtomicUsize,
    aggregate_writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_topic(&self, user_id: &str, topic: &str, total: u32, correct: u32) {
        let mut state = self.state.lock().unwrap();
        state.topic_stats.insert(
            (user_id.to_string(), topic.to_string()),
            TopicStat {
                topic: topic.to_string(),
                total_attempts: total,
                correct_attempts: correct,
                total_time_ms: total as u64 * 45_000,
            },
        );
    }

    /// Appends attempts oldest first.
    pub fn seed_recent(&self, user_id: &str, attempts: &[Attempt]) {
        let mut state = self.state.lock().unwrap();
        for attempt in attempts {
            state
                .attempts
                .push(AttemptRecord::new(user_id, None, attempt));
        }
    }

    /// Lets `n` more attempt inserts succeed, then fails every one after.
    pub fn fail_attempt_inserts_after(&self, n: usize) {
        *self.attempt_insert_budget.lock().unwrap() = Some(n);
    }

    /// Makes the next `n` conditional aggregate writes report a conflict.
    pub fn force_aggregate_conflicts(&self, n: usize) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    pub fn stat(&self, user_id: &str, topic: &str) -> Option<TopicStat> {
        let state = self.state.lock().unwrap();
        state
            .topic_stats
            .get(&(user_id.to_string(), topic.to_string()))
            .cloned()
    }

    pub fn attempt_count(&self, user_id: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .attempts
            .iter()
            .filter(|record| record.user_id == user_id)
            .count()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    pub fn aggregate(&self, user_id: &str) -> Option<UserAggregate> {
        self.state.lock().unwrap().aggregates.get(user_id).cloned()
    }

    pub fn aggregate_writes(&self) -> usize {
        self.aggregate_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PerformanceStore for InMemoryStore {
    async fn topic_stats(&self, user_id: &str) -> Result<Vec<TopicStat>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .topic_stats
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|(_, stat)| stat.clone())
            .collect())
    }

    async fn recent_attempts(&self, user_id: &str, limit: usize) -> Result<Vec<Attempt>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .attempts
            .iter()
            .rev()
            .filter(|record| record.user_id == user_id)
            .take(limit)
            .map(AttemptRecord::as_attempt)
            .collect())
    }

    async fn upsert_topic_stat(
        &self,
        user_id: &str,
        topic: &str,
        delta: TopicDelta,
    ) -> Result<TopicStat> {
        let mut state = self.state.lock().unwrap();
        let stat = state
            .topic_stats
            .entry((user_id.to_string(), topic.to_string()))
            .or_insert_with(|| TopicStat::empty(topic));
        stat.apply(&delta);
        Ok(stat.clone())
    }

    async fn insert_attempt(&self, attempt: &AttemptRecord) -> Result<()> {
        {
            let mut budget = self.attempt_insert_budget.lock().unwrap();
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    anyhow::bail!("store unavailable");
                }
                *remaining -= 1;
            }
        }
        self.state.lock().unwrap().attempts.push(attempt.clone());
        Ok(())
    }

    async fn insert_game_session(
        &self,
        user_id: &str,
        summary: &GameSessionSummary,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let id = format!("session-{}", state.sessions.len() + 1);
        state
            .sessions
            .push((id.clone(), user_id.to_string(), summary.clone()));
        Ok(id)
    }

    async fn user_aggregate(&self, user_id: &str) -> Result<Option<UserAggregate>> {
        let aggregate = self.aggregate(user_id);
        // Let concurrent writers run between the read and the write.
        tokio::task::yield_now().await;
        Ok(aggregate)
    }

    async fn upsert_user_aggregate(
        &self,
        aggregate: &UserAggregate,
        expected_version: Option<u64>,
    ) -> Result<bool> {
        tokio::task::yield_now().await;
        self.aggregate_writes.fetch_add(1, Ordering::SeqCst);

        let forced = self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Ok(false);
        }

        let mut state = self.state.lock().unwrap();
        let current = state
            .aggregates
            .get(&aggregate.user_id)
            .map(|existing| existing.version);
        if current != expected_version {
            return Ok(false);
        }
        state
            .aggregates
            .insert(aggregate.user_id.clone(), aggregate.clone());
        Ok(true)
    }
}

/// Generator that replays queued replies and records every request.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, content: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(content.into()));
    }

    pub fn fail(&self, error: GenerationError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

/// Search backend that rate-limits the first `failures` calls.
pub struct ScriptedSearch {
    failures: AtomicUsize,
    failure: SearchError,
    calls: Mutex<Vec<(String, usize, tokio::time::Instant)>>,
}

impl ScriptedSearch {
    /// Fails the first `failures` calls as rate limited.
    pub fn new(failures: usize) -> Arc<Self> {
        Self::failing_with(
            failures,
            SearchError::RateLimited("202 Ratelimit".to_string()),
        )
    }

    pub fn failing_with(failures: usize, failure: SearchError) -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicUsize::new(failures),
            failure,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(query, n, _)| (query.clone(), *n))
            .collect()
    }

    pub fn call_times(&self) -> Vec<tokio::time::Instant> {
        self.calls.lock().unwrap().iter().map(|(_, _, at)| *at).collect()
    }
}

#[async_trait]
impl SearchClient for ScriptedSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), max_results, tokio::time::Instant::now()));

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(self.failure.clone());
        }

        Ok((1..=max_results)
            .map(|i| SearchHit {
                title: format!("Result {} for {}", i, query),
                body: format!("Worked example number {} explaining the idea step by step.", i),
            })
            .collect())
    }
}

pub fn question_json(id: u32, topic: &str) -> serde_json::Value {
    json!({
        "id": id,
        "question": format!("Question {} about {}?", id, topic),
        "options": ["A", "B", "C", "D"],
        "correctAnswer": 1,
        "topic": topic,
        "difficulty": "medium",
        "explanation": "Because B.",
        "reasoning": "Targets a recent mistake"
    })
}

pub fn questions_reply(topics: &[&str]) -> String {
    let items: Vec<_> = topics
        .iter()
        .enumerate()
        .map(|(i, topic)| question_json(i as u32 + 1, topic))
        .collect();
    format!(
        "Here are your questions:\n```json\n{}\n```",
        serde_json::Value::Array(items)
    )
}

pub fn agent(
    user_id: &str,
    store: Arc<InMemoryStore>,
    generator: Arc<ScriptedGenerator>,
    search: Option<Arc<ScriptedSearch>>,
) -> LearningAgent {
    let deps = AgentDeps {
        store,
        generator,
        search: search.map(|search| search as Arc<dyn SearchClient>),
    };
    LearningAgent::new(user_id, deps, PlannerSettings::default())
}
