//! Conversational agent for the browser enhancer.
//!
//! The [`router`] module drives the model/tool graph: it calls the chat
//! model, invokes the enhancement capability when the model asks for it, and
//! stops when the model produces a plain reply. The [`crew`] module is that
//! capability: a sequential pipeline of persona-bound prompt tasks.

pub mod capability;
pub mod crew;
pub mod events;
pub mod router;

pub use capability::{Capability, CapabilityArgs, FALLBACK_REPLY};
pub use crew::{
    extract_final_response, Crew, CrewInputs, CrewOutput, CrewTask, MemoryCrewCapability, Persona,
    TaskOutput,
};
pub use events::StreamEvent;
pub use router::{Agent, ChatModel, ModelReply, ModelStep};
