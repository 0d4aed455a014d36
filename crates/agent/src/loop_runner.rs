//! The conversation loop: call the model, run requested tools, repeat.

use std::sync::Arc;

use salin_config::AppConfig;
use salin_core::accumulator::ToolCallAccumulator;
use salin_core::error::Error;
use salin_core::message::{Conversation, Message, MessageToolCall, Role};
use salin_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice, Usage};
use salin_core::tool::{ToolCall, ToolRegistry};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::stream_event::AgentStreamEvent;

/// Drives one conversation turn until the model answers in plain text.
pub struct AgentLoop {
    /// The completion provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per response
    max_tokens: Option<u32>,

    /// Nucleus sampling
    top_p: Option<f32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Inserted as the first message when the history has none
    system_prompt: Option<String>,

    /// Maximum model calls per turn
    max_iterations: u32,

    /// Use the streaming completion path
    stream: bool,

    /// Receives progress events, if attached
    events: Option<mpsc::Sender<AgentStreamEvent>>,
}

/// Counters for one turn.
#[derive(Default)]
struct TurnStats {
    iterations: u32,
    tool_calls_made: usize,
    usage: Option<Usage>,
}

impl TurnStats {
    fn add_usage(&mut self, usage: &Usage) {
        let total = self.usage.get_or_insert(Usage {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
        });
        total.prompt_tokens += usage.prompt_tokens;
        total.completion_tokens += usage.completion_tokens;
        total.total_tokens += usage.total_tokens;
    }
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            top_p: None,
            tools,
            system_prompt: None,
            max_iterations: 10,
            stream: false,
            events: None,
        }
    }

    /// Create an agent loop from the chat defaults and `[agent]` config.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Self {
        let mut agent = Self::new(provider, &config.default_model, config.default_temperature, tools)
            .with_max_tokens(config.default_max_tokens)
            .with_top_p(config.default_top_p)
            .with_max_iterations(config.agent.max_iterations)
            .with_streaming(config.agent.stream);
        if let Some(prompt) = &config.agent.system_prompt {
            agent = agent.with_system_prompt(prompt);
        }
        agent
    }

    /// Set the maximum number of model calls per turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Consume the model's reply as a delta stream.
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.stream = enabled;
        self
    }

    /// Send progress events to `tx` while turns run.
    pub fn with_event_sender(mut self, tx: mpsc::Sender<AgentStreamEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Append the user's message and run the turn.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        user_input: impl Into<String>,
    ) -> Result<String, Error> {
        conversation.push(Message::user(user_input));
        self.process(conversation).await
    }

    /// Run the loop over the existing history and return the final text.
    ///
    /// Every model reply and tool result is appended to `conversation`. If a
    /// tool round fails, that round's assistant turn and partial results are
    /// removed again so the history stays valid for the next turn.
    pub async fn process(&self, conversation: &mut Conversation) -> Result<String, Error> {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.messages.len(),
            "Processing conversation"
        );

        match self.drive(conversation).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(conversation_id = %conversation.id, error = %e, "Turn failed");
                self.emit(AgentStreamEvent::Error {
                    message: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    async fn drive(&self, conversation: &mut Conversation) -> Result<String, Error> {
        if let Some(prompt) = &self.system_prompt {
            let has_system = conversation
                .messages
                .first()
                .is_some_and(|m| m.role == Role::System);
            if !has_system {
                conversation.messages.insert(0, Message::system(prompt));
            }
        }

        let tool_definitions = self.tools.definitions();
        let mut stats = TurnStats::default();

        while stats.iterations < self.max_iterations {
            stats.iterations += 1;
            conversation.check_tool_links()?;

            debug!(
                conversation_id = %conversation.id,
                iteration = stats.iterations,
                "Agent loop iteration"
            );

            let mut request = ProviderRequest::new(&self.model, conversation.messages.clone());
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;
            request.top_p = self.top_p;
            request.stream = self.stream;
            if !tool_definitions.is_empty() {
                request.tools = tool_definitions.clone();
                request.tool_choice = Some(ToolChoice::Auto);
            }

            let response = self.call_model(request).await?;
            if let Some(usage) = &response.usage {
                stats.add_usage(usage);
            }

            if !response.wants_tools() || response.message.tool_calls.is_empty() {
                if response.wants_tools() {
                    warn!("Model signalled tool calls but sent none, treating reply as final");
                }
                let text = response.message.text().to_string();
                conversation.push(response.message);

                info!(
                    conversation_id = %conversation.id,
                    iterations = stats.iterations,
                    tool_calls = stats.tool_calls_made,
                    "Turn complete"
                );
                self.emit(AgentStreamEvent::Done {
                    conversation_id: conversation.id.to_string(),
                    usage: stats.usage,
                    iterations: stats.iterations,
                    tool_calls_made: stats.tool_calls_made,
                })
                .await;
                return Ok(text);
            }

            debug!(
                tool_count = response.message.tool_calls.len(),
                "Executing tool calls"
            );

            let round_start = conversation.messages.len();
            let tool_calls = response.message.tool_calls.clone();
            conversation.push(response.message);

            if let Err(e) = self.dispatch(conversation, &tool_calls, &mut stats).await {
                // Providers reject histories with unanswered tool calls.
                conversation.messages.truncate(round_start);
                return Err(e);
            }
        }

        Err(Error::IterationLimit(self.max_iterations))
    }

    /// Run every requested tool in order and append one result per call.
    async fn dispatch(
        &self,
        conversation: &mut Conversation,
        tool_calls: &[MessageToolCall],
        stats: &mut TurnStats,
    ) -> Result<(), Error> {
        for tc in tool_calls {
            let call = ToolCall::parse(tc)?;

            self.emit(AgentStreamEvent::ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.arguments.clone(),
            })
            .await;

            let start = std::time::Instant::now();
            let value = self.tools.execute(&call).await?;
            let output = serde_json::to_string(&value)?;
            stats.tool_calls_made += 1;

            debug!(
                tool = %tc.name,
                duration_ms = start.elapsed().as_millis() as u64,
                "Tool executed"
            );

            self.emit(AgentStreamEvent::ToolResult {
                id: tc.id.clone(),
                name: tc.name.clone(),
                output: output.clone(),
            })
            .await;

            conversation.push(Message::tool_result(&tc.id, &tc.name, output));
        }
        Ok(())
    }

    /// One model call, streamed or not.
    async fn call_model(&self, request: ProviderRequest) -> Result<ProviderResponse, Error> {
        if !self.stream {
            return Ok(self.provider.complete(request).await?);
        }

        let mut rx = self.provider.stream(request).await?;
        let mut acc = ToolCallAccumulator::new();
        while let Some(delta) = rx.recv().await {
            let delta = delta?;
            if let Some(text) = delta.content.as_deref().filter(|t| !t.is_empty()) {
                self.emit(AgentStreamEvent::Chunk {
                    content: text.to_string(),
                })
                .await;
            }
            acc.push_delta(&delta);
        }
        Ok(acc.finish(&self.model)?)
    }

    async fn emit(&self, event: AgentStreamEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_helpers::*;
    use salin_core::error::{ProviderError, ToolError};
    use salin_core::provider::{DeltaReceiver, FinishReason, StreamDelta, ToolCallFragment};

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(salin_tools::default_registry())
    }

    fn agent(provider: Arc<dyn Provider>) -> AgentLoop {
        AgentLoop::new(provider, "mock-model", 0.6, registry())
    }

    #[tokio::test]
    async fn simple_text_response() {
        let provider = Arc::new(SequentialMockProvider::replies(&["Kumusta! Paano kita matutulungan?"]));
        let mut conv = Conversation::new();

        let response = agent(provider).run_turn(&mut conv, "Hello!").await.unwrap();

        assert_eq!(response, "Kumusta! Paano kita matutulungan?");
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].role, Role::User);
        assert_eq!(conv.messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn one_tool_round_then_answer() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(
                vec![make_tool_call("get_weather", serde_json::json!({"city": "Manila"}))],
                "",
            ),
            make_text_response("Maaraw sa Maynila."),
        ]));
        let mut conv = Conversation::new();

        let response = agent(provider.clone())
            .run_turn(&mut conv, "What's the weather in Manila?")
            .await
            .unwrap();

        assert_eq!(response, "Maaraw sa Maynila.");
        assert_eq!(provider.call_count(), 2);

        let roles: Vec<Role> = conv.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(conv.messages[1].tool_calls.len(), 1);
        assert!(conv.messages[1].content.is_none());
        assert_eq!(conv.messages[2].tool_call_id.as_deref(), Some("call_get_weather"));
        assert_eq!(conv.messages[2].name.as_deref(), Some("get_weather"));

        let result: serde_json::Value = serde_json::from_str(conv.messages[2].text()).unwrap();
        assert_eq!(result["city"], "Manila");

        // The second call saw the tool result.
        let second = &provider.requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.tool_choice, Some(ToolChoice::Auto));
        assert_eq!(second.tools.len(), 2);
    }

    #[tokio::test]
    async fn unknown_tool_is_fatal() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_tool_call_response(
            vec![make_tool_call("translate_poem", serde_json::json!({}))],
            "",
        )]));
        let mut conv = Conversation::new();

        let err = agent(provider.clone())
            .run_turn(&mut conv, "Translate this poem")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Tool(ToolError::NotFound(name)) if name == "translate_poem"));
        assert_eq!(provider.call_count(), 1);
        // The unanswered tool round is rolled back, no tool result is fabricated.
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn failed_tool_round_does_not_leak_into_next_turn() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(
                vec![make_tool_call("translate_poem", serde_json::json!({}))],
                "",
            ),
            make_text_response("Pasensya na, hindi ko iyan magagawa."),
        ]));
        let agent = agent(provider.clone());
        let mut conv = Conversation::new();

        agent
            .run_turn(&mut conv, "Translate this poem")
            .await
            .unwrap_err();
        let reply = agent.run_turn(&mut conv, "Never mind").await.unwrap();

        assert_eq!(reply, "Pasensya na, hindi ko iyan magagawa.");
        let requests = provider.requests();
        let second = &requests[1];
        let roles: Vec<Role> = second.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::User]);
        assert!(second.messages.iter().all(|m| m.tool_calls.is_empty()));
        assert!(conv.check_tool_links().is_ok());
    }

    #[tokio::test]
    async fn partial_tool_results_are_rolled_back() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_tool_call_response(
            vec![
                make_tool_call("get_weather", serde_json::json!({"city": "Manila"})),
                make_tool_call("translate_poem", serde_json::json!({})),
            ],
            "",
        )]));
        let mut conv = Conversation::new();

        let err = agent(provider).run_turn(&mut conv, "Both please").await.unwrap_err();

        assert!(matches!(err, Error::Tool(ToolError::NotFound(_))));
        assert_eq!(conv.messages.len(), 1);
    }

    #[tokio::test]
    async fn tool_failure_propagates() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_tool_call_response(
            vec![make_tool_call("get_weather", serde_json::json!({"town": "Manila"}))],
            "",
        )]));
        let mut conv = Conversation::new();

        let err = agent(provider)
            .run_turn(&mut conv, "Weather?")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn transport_errors_halt_the_turn() {
        let provider = Arc::new(SequentialMockProvider::with_results(vec![Err(
            ProviderError::RateLimited {
                retry_after_secs: 5,
            },
        )]));
        let mut conv = Conversation::new();

        let err = agent(provider).run_turn(&mut conv, "Hi").await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::RateLimited { .. })));
        assert_eq!(conv.messages.len(), 1);
    }

    #[tokio::test]
    async fn iteration_limit_ends_the_turn() {
        let call = || {
            make_tool_call_response(
                vec![make_tool_call("get_weather", serde_json::json!({"city": "Baguio"}))],
                "",
            )
        };
        let provider = Arc::new(SequentialMockProvider::new(vec![call(), call()]));
        let mut conv = Conversation::new();

        let err = agent(provider.clone())
            .with_max_iterations(2)
            .run_turn(&mut conv, "Loop forever")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::IterationLimit(2)));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn system_prompt_is_inserted_once() {
        let provider = Arc::new(SequentialMockProvider::replies(&["Oo.", "Hindi."]));
        let agent = agent(provider).with_system_prompt("You are a Filipino translation assistant.");
        let mut conv = Conversation::new();

        agent.run_turn(&mut conv, "Una").await.unwrap();
        agent.run_turn(&mut conv, "Pangalawa").await.unwrap();

        let systems = conv.messages.iter().filter(|m| m.role == Role::System).count();
        assert_eq!(systems, 1);
        assert_eq!(conv.messages[0].role, Role::System);
        assert_eq!(conv.messages.len(), 5);
    }

    #[tokio::test]
    async fn events_report_tool_round_and_done() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(
                vec![make_tool_call("get_weather", serde_json::json!({"city": "Cebu"}))],
                "Checking.",
            ),
            make_text_response("Done."),
        ]));
        let (tx, mut rx) = mpsc::channel(32);
        let mut conv = Conversation::new();

        agent(provider)
            .with_event_sender(tx)
            .run_turn(&mut conv, "Weather in Cebu?")
            .await
            .unwrap();

        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AgentStreamEvent::Done {
                iterations,
                tool_calls_made,
                usage,
                ..
            } = &event
            {
                assert_eq!(*iterations, 2);
                assert_eq!(*tool_calls_made, 1);
                assert_eq!(usage.as_ref().unwrap().total_tokens, 30);
            }
            types.push(event.event_type());
        }
        assert_eq!(types, vec!["tool_call", "tool_result", "done"]);
    }

    /// Streams a scripted list of delta batches, one batch per call.
    struct ChunkedProvider {
        batches: std::sync::Mutex<Vec<Vec<StreamDelta>>>,
    }

    #[async_trait::async_trait]
    impl Provider for ChunkedProvider {
        fn name(&self) -> &str {
            "chunked"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            unreachable!("streaming tests only")
        }

        async fn stream(&self, _request: ProviderRequest) -> Result<DeltaReceiver, ProviderError> {
            let batch = self.batches.lock().unwrap().remove(0);
            let (tx, rx) = mpsc::channel(batch.len().max(1));
            for delta in batch {
                tx.send(Ok(delta)).await.unwrap();
            }
            Ok(rx)
        }
    }

    #[tokio::test]
    async fn streaming_turn_assembles_tool_call_fragments() {
        let fragment = |index, id: Option<&str>, name: Option<&str>, args: &str| StreamDelta {
            tool_calls: vec![ToolCallFragment {
                index,
                id: id.map(String::from),
                name: name.map(String::from),
                arguments: Some(args.to_string()),
            }],
            ..Default::default()
        };
        let provider = Arc::new(ChunkedProvider {
            batches: std::sync::Mutex::new(vec![
                vec![
                    fragment(0, Some("call_a"), Some("get_weather"), ""),
                    fragment(0, None, None, "{\"city\":"),
                    fragment(0, None, None, "\"Iloilo\"}"),
                    StreamDelta {
                        finish_reason: Some(FinishReason::ToolCalls),
                        ..Default::default()
                    },
                ],
                vec![
                    StreamDelta {
                        content: Some("Maulap ".into()),
                        ..Default::default()
                    },
                    StreamDelta {
                        content: Some("sa Iloilo.".into()),
                        finish_reason: Some(FinishReason::Stop),
                        ..Default::default()
                    },
                ],
            ]),
        });
        let (tx, mut rx) = mpsc::channel(32);
        let mut conv = Conversation::new();

        let text = agent(provider)
            .with_streaming(true)
            .with_event_sender(tx)
            .run_turn(&mut conv, "Weather in Iloilo?")
            .await
            .unwrap();

        assert_eq!(text, "Maulap sa Iloilo.");
        assert_eq!(conv.messages[1].tool_calls[0].arguments, "{\"city\":\"Iloilo\"}");
        assert_eq!(conv.messages[2].name.as_deref(), Some("get_weather"));

        let mut chunks = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AgentStreamEvent::Chunk { content } = event {
                chunks.push(content);
            }
        }
        assert_eq!(chunks, vec!["Maulap ", "sa Iloilo."]);
    }

    #[tokio::test]
    async fn truncated_stream_is_an_error() {
        let provider = Arc::new(ChunkedProvider {
            batches: std::sync::Mutex::new(vec![vec![StreamDelta {
                content: Some("Naputol".into()),
                ..Default::default()
            }]]),
        });
        let mut conv = Conversation::new();

        let err = agent(provider)
            .with_streaming(true)
            .run_turn(&mut conv, "Hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::StreamInterrupted(_))));
    }

    #[test]
    fn from_config_reads_chat_defaults() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 3;
        config.agent.system_prompt = Some("Be brief.".into());
        let provider = Arc::new(SequentialMockProvider::new(vec![]));

        let agent = AgentLoop::from_config(provider, registry(), &config);
        assert_eq!(agent.model, "moonshotai/kimi-k2-instruct");
        assert_eq!(agent.max_tokens, Some(4096));
        assert_eq!(agent.top_p, Some(1.0));
        assert_eq!(agent.max_iterations, 3);
        assert_eq!(agent.system_prompt.as_deref(), Some("Be brief."));
    }
}
