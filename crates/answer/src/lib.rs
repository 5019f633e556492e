//! Answer-generation stack: an LLM client, the subagent re-rank filter, the
//! iterative and accumulated searchers, the abstain guardrail, and the
//! orchestrator that wires all of them into the public answer operations.

pub mod accumulator;
pub mod guardrail;
pub mod iterative;
pub mod llm;
pub mod orchestrator;
pub mod subagent;

pub use accumulator::{AccumulatedHit, AccumulatorConfig, AccumulatedSearchResult, SearchMetadataEntry, accumulated_search};
pub use guardrail::{AbstainThresholds, get_abstain_reason, should_abstain};
pub use iterative::{IterativeConfig, iterative_search, should_use_iterative};
pub use llm::{LlmClient, LlmConfig};
pub use orchestrator::{
    AccumulatedAnswerResult, AnswerResult, Citation, OrchestratorContext, UnifiedPlan, UnifiedPlanStep,
    answer_accumulated, answer_generate, answer_unified,
};
pub use subagent::subagent_filter;
