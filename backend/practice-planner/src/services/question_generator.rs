use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::PlannerSettings;
use crate::metrics::{GENERATION_REQUESTS_TOTAL, QUESTIONS_GENERATED_TOTAL, QUESTIONS_REJECTED_TOTAL};
use crate::models::{ContentPlan, GeneratedQuestion, PerformanceAnalysis};
use crate::services::collaborators::{GenerationClient, GenerationRequest};
use crate::services::context_builder::{question_prompt, question_system_prompt};
use crate::services::response_extractor::parse_questions;

#[derive(Debug, Clone)]
pub struct MemoryRecord {
    pub analysis: PerformanceAnalysis,
    pub generated_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Fixed-capacity log of successful generations; the oldest record is evicted
/// once the capacity is reached.
#[derive(Debug)]
pub struct SessionMemory {
    records: VecDeque<MemoryRecord>,
    capacity: usize,
}

impl SessionMemory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: MemoryRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.records.iter()
    }
}

/// Issues the generation request and turns the reply into questions.
///
/// Never fails: transport errors and malformed replies both yield an empty
/// list, which callers must read as "generation unavailable".
pub struct QuestionGenerator {
    client: Arc<dyn GenerationClient>,
    subject: String,
    temperature: f32,
    max_tokens: u32,
    memory: SessionMemory,
}

impl QuestionGenerator {
    pub fn new(client: Arc<dyn GenerationClient>, settings: &PlannerSettings) -> Self {
        Self {
            client,
            subject: settings.subject.clone(),
            temperature: settings.question_temperature,
            max_tokens: settings.question_max_tokens,
            memory: SessionMemory::with_capacity(settings.session_memory_capacity),
        }
    }

    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    pub async fn generate(
        &mut self,
        brief: &str,
        analysis: &PerformanceAnalysis,
        plan: &ContentPlan,
    ) -> Vec<GeneratedQuestion> {
        let request = GenerationRequest {
            system_prompt: question_system_prompt(&self.subject),
            user_prompt: question_prompt(&self.subject, brief, analysis, plan),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        info!(
            requested = plan.total(),
            weak = plan.weak_count,
            mixed = plan.mixed_count,
            strong = plan.strong_count,
            "Requesting question generation"
        );

        let content = match self.client.generate(&request).await {
            Ok(content) => content,
            Err(err) => {
                GENERATION_REQUESTS_TOTAL
                    .with_label_values(&["transport_error"])
                    .inc();
                warn!(error = %err, "Question generation request failed");
                return Vec::new();
            }
        };

        match parse_questions(&content) {
            Ok(parsed) => {
                GENERATION_REQUESTS_TOTAL.with_label_values(&["success"]).inc();
                QUESTIONS_GENERATED_TOTAL.inc_by(parsed.questions.len() as u64);
                QUESTIONS_REJECTED_TOTAL.inc_by(parsed.rejected as u64);

                if parsed.questions.len() != plan.total() as usize {
                    warn!(
                        requested = plan.total(),
                        received = parsed.questions.len(),
                        rejected = parsed.rejected,
                        "Generator returned a different number of questions than requested"
                    );
                }

                self.memory.push(MemoryRecord {
                    analysis: analysis.clone(),
                    generated_count: parsed.questions.len(),
                    timestamp: Utc::now(),
                });
                parsed.questions
            }
            Err(err) => {
                GENERATION_REQUESTS_TOTAL.with_label_values(&["malformed"]).inc();
                let preview: String = content.chars().take(500).collect();
                warn!(error = %err, response = %preview, "Failed to parse generated questions");
                Vec::new()
            }
        }
    }
}
