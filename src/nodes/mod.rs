//! Node types for the knowledge graph.
//!
//! - [`EntityNode`]: real-world entities (people, decisions, failures, concepts)
//! - [`EpisodeNode`]: ingested data episodes (messages, documents, JSON records)
//! - [`CommunityNode`]: cluster summaries over related entities

pub mod community;
pub mod entity;
pub mod episodic;

pub use community::CommunityNode;
pub use entity::{clamp_salience, default_salience, EntityNode};
pub use episodic::{EpisodeNode, EpisodeSource};
