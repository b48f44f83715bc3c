//! Prompt templates for LLM interactions.
//!
//! Prompts are stored as Rust string literals (not external files) for
//! compile-time inclusion and zero-cost access.

/// System prompt for entity/relation extraction over a single episode.
///
/// The model classifies each extracted entity with an open-ended type label;
/// the four memory-specific labels carry salience defaults downstream.
pub const EXTRACT_SYSTEM: &str = "\
You are a knowledge extraction engine for an agent memory system. \
Given one episode of raw content, extract the entities it mentions and the \
factual relationships between them.

Rules:
- Entity names are short noun phrases, not sentences.
- entity_type is a single word: Person, Organization, Place, Fact, Decision, \
Failure, Reflection, or Entity when nothing more specific fits.
- Use Decision for choices with reasoning, Failure for things that went \
wrong, Reflection for lessons or recognized patterns.
- attributes holds any structured detail worth keeping (key-value pairs).
- Each relation's fact is one short natural-language statement, and source / \
target must exactly match an extracted entity name.
- valid_at is when the fact became true in the real world, if the content \
says (ISO date or year); omit it otherwise.
- Extract only what the content states. Do not invent.";

/// User-prompt template for extraction; `{reference_time}` and `{content}`
/// are substituted by the adapter.
pub const EXTRACT_USER_TEMPLATE: &str = "\
REFERENCE TIME (when this episode happened): {reference_time}

EPISODE CONTENT:
{content}";

/// System prompt for cross-encoder reranking.
pub const RERANK_SYSTEM: &str = "\
You are a relevance judge. Given a QUERY and a numbered list of PASSAGES, \
score how relevant each passage is to the query from 0 (unrelated) to 100 \
(directly answers it). Return one score per passage, in order. Judge \
relevance only; ignore writing quality.";
