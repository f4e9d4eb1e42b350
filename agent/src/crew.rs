use std::sync::Arc;

use async_trait::async_trait;
use enhancer_core::{FunctionDeclaration, TextModel};
use serde_json::json;
use tracing::{debug, info};

use crate::capability::{Capability, CapabilityArgs};

/// A persona a crew task runs under.
#[derive(Debug, Clone)]
pub struct Persona {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

/// A single prompt task bound to a persona and a text model.
pub struct CrewTask {
    pub persona: Persona,
    /// Template interpolated with `{query}`, `{memories}`, `{user_context}`.
    pub description: String,
    pub expected_output: String,
    pub model: Arc<dyn TextModel>,
}

/// Per-kickoff inputs interpolated into task templates.
#[derive(Debug, Clone, Default)]
pub struct CrewInputs {
    pub query: String,
    pub memories: String,
    pub user_context: String,
}

/// Output of one completed task.
#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub agent: String,
    pub description: String,
    pub raw: String,
}

/// Overall crew result.
///
/// `raw` holds the final task's output; `tasks_output` every task's output
/// in execution order.
#[derive(Debug, Clone, Default)]
pub struct CrewOutput {
    pub raw: String,
    pub tasks_output: Vec<TaskOutput>,
}

/// A fixed, sequential pipeline of persona-bound prompt tasks.
pub struct Crew {
    tasks: Vec<CrewTask>,
}

impl Crew {
    pub fn new(tasks: Vec<CrewTask>) -> Self {
        Self { tasks }
    }

    /// The shipped browser-memory crew: a single friendly chat persona.
    pub fn browser_memory(model: Arc<dyn TextModel>) -> Self {
        let persona = Persona {
            role: "Friendly Chat Assistant".to_string(),
            goal: "Respond to the user naturally and conversationally, like a friend \
                   who knows what they've been browsing"
                .to_string(),
            backstory: "You're a casual, friendly AI who has access to the user's browsing \
                        history. You chat naturally like a good friend would - not formal or \
                        analytical. When they say 'wassup' or 'hey', you respond like a normal \
                        person. You can mention their browsing when it's relevant, but keep it \
                        conversational and fun."
                .to_string(),
        };

        let description = "The user said: \"{query}\"\n\n\
            Here's what they've been browsing: {memories}\n\n\
            Previous context: {user_context}\n\n\
            Respond to them like a friend would. If they're just saying 'wassup', 'hey', or \
            'hi', respond casually.\n\
            You can mention their browsing if it's relevant, but keep it natural and \
            conversational.\n\n\
            Examples:\n\
            - If they say \"wassup\": \"Hey! Not much, just been checking out your browsing. \
            I see you've been diving into some AI stuff - pretty cool! What's up?\"\n\
            - If they ask about something specific: Give them a helpful but casual response\n\
            - Keep it friendly and natural, not formal or analytical"
            .to_string();

        let expected_output = "A casual, friendly chat response that feels like talking to a \
                               knowledgeable friend. No formal analysis or structured responses \
                               - just natural conversation."
            .to_string();

        Self::new(vec![CrewTask {
            persona,
            description,
            expected_output,
            model,
        }])
    }

    /// Execute all tasks in order, threading each output into the next
    /// task's context. Errors propagate to the caller; the crew itself does
    /// not recover.
    pub async fn kickoff(&self, inputs: &CrewInputs) -> anyhow::Result<CrewOutput> {
        let mut tasks_output: Vec<TaskOutput> = Vec::with_capacity(self.tasks.len());

        for (index, task) in self.tasks.iter().enumerate() {
            let description = render_template(&task.description, inputs);
            let prompt = build_task_prompt(task, &description, &tasks_output);

            debug!(
                task = index,
                agent = %task.persona.role,
                model = %task.model.model_name(),
                "Running crew task"
            );
            let raw = task.model.generate(&prompt).await?;

            tasks_output.push(TaskOutput {
                agent: task.persona.role.clone(),
                description,
                raw,
            });
        }

        let raw = tasks_output
            .last()
            .map(|output| output.raw.clone())
            .unwrap_or_default();

        info!(tasks = tasks_output.len(), "Crew run completed");
        Ok(CrewOutput { raw, tasks_output })
    }
}

/// Interpolate `{query}`, `{memories}`, and `{user_context}` placeholders.
fn render_template(template: &str, inputs: &CrewInputs) -> String {
    template
        .replace("{query}", &inputs.query)
        .replace("{memories}", &inputs.memories)
        .replace("{user_context}", &inputs.user_context)
}

/// Assemble the full prompt for one task: persona framing, prior task
/// outputs, the task itself, and the expected output shape.
fn build_task_prompt(task: &CrewTask, description: &str, prior: &[TaskOutput]) -> String {
    let mut prompt = format!(
        "You are {role}.\nYour goal: {goal}\nBackstory: {backstory}\n\n",
        role = task.persona.role,
        goal = task.persona.goal,
        backstory = task.persona.backstory,
    );

    if !prior.is_empty() {
        prompt.push_str("Context from previous tasks:\n");
        for output in prior {
            prompt.push_str(&output.raw);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str(description);
    prompt.push_str("\n\nExpected output: ");
    prompt.push_str(&task.expected_output);
    prompt
}

/// Pick the response text out of a crew result.
///
/// Prefers the structured `raw` field, then the last task's own raw output,
/// then a stringified dump of the whole result.
pub fn extract_final_response(output: &CrewOutput) -> String {
    let raw = output.raw.trim();
    if !raw.is_empty() {
        return raw.to_string();
    }

    if let Some(last) = output.tasks_output.last() {
        let last_raw = last.raw.trim();
        if !last_raw.is_empty() {
            return last_raw.to_string();
        }
    }

    format!("{:?}", output)
}

/// The enhancement capability backed by the browser-memory crew.
pub struct MemoryCrewCapability {
    crew: Crew,
}

impl MemoryCrewCapability {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self {
            crew: Crew::browser_memory(model),
        }
    }

    pub fn with_crew(crew: Crew) -> Self {
        Self { crew }
    }
}

#[async_trait]
impl Capability for MemoryCrewCapability {
    fn name(&self) -> &str {
        "enhance_memory_response"
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name().to_string(),
            description: Some(
                "Get conversational context about the user's browsing to help you chat \
                 naturally with them."
                    .to_string(),
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The user's message"
                    },
                    "memories": {
                        "type": "string",
                        "description": "Formatted browsing memories relevant to the query"
                    },
                    "user_context": {
                        "type": "string",
                        "description": "Previous conversation context"
                    }
                },
                "required": ["query", "memories", "user_context"]
            }),
        }
    }

    async fn invoke(&self, args: CapabilityArgs) -> anyhow::Result<String> {
        let inputs = CrewInputs {
            query: args.query,
            memories: args.memories,
            user_context: args.user_context,
        };

        let result = self.crew.kickoff(&inputs).await?;
        Ok(extract_final_response(&result))
    }
}
