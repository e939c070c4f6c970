//! Content port: negotiation chat text.
//!
//! The coordinator always picks a fallback line itself and hands it to a
//! [`ContentProvider`], which may return something better. A provider never
//! fails: any problem with the text backend (not configured, rate limited,
//! slow, malformed) yields the fallback.
//!
//! The binary runs on [`ScriptedContent`]. [`RateLimitedContent`] is the
//! extension point for a real text backend: implement [`TextGenerator`] for
//! an API client and wrap it.

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::config::ContentConfig;
use crate::error::ContentError;
use crate::model::{AgentId, AgentRole};

/// What the generated line has to say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Employer opens the conversation.
    Greeting,
    /// Worker quotes the asking price.
    WorkerOffer,
    /// Employer takes the price on the table.
    EmployerAccept,
    /// Employer declines the price on the table.
    EmployerReject,
    /// Employer proposes a lower price.
    EmployerCounter,
    /// Employer dismisses the worker rudely.
    AngryRejection,
    /// Employer turns the worker down politely.
    PoliteRejection,
    /// Worker answers a rude dismissal in kind.
    AngryWorkerResponse,
    /// Worker takes the employer's counter.
    WorkerAcceptCounter,
    /// Worker meets the employer part way.
    WorkerCounter,
    /// Worker walks away.
    WorkerRejectCounter,
    /// Deal confirmation.
    Closing,
}

/// One earlier line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLine {
    /// Who said it.
    pub sender: AgentId,
    /// What was said.
    pub content: String,
}

/// Everything a provider needs to write one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    /// What the line is for.
    pub kind: PhaseKind,
    /// Who will send it.
    pub speaker_id: AgentId,
    /// Speaker's display name.
    pub speaker: String,
    /// Speaker's role.
    pub speaker_role: AgentRole,
    /// Other party's display name.
    pub counterpart: String,
    /// Amount the line is about (offer, counter, agreed price).
    pub amount: u64,
    /// Worker's original asking price.
    pub asking_price: u64,
    /// Line of work under discussion.
    pub specialization: String,
    /// Conversation so far.
    pub history: Vec<HistoryLine>,
    /// Line to use when nothing better is available.
    pub fallback: String,
}

/// Produces negotiation chat text.
pub trait ContentProvider: Send + Sync + 'static {
    /// Text for `request`. Infallible; degrades to `request.fallback`.
    fn generate(&self, request: ContentRequest) -> impl std::future::Future<Output = String> + Send;
}

/// Always answers with the fallback line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedContent;

impl ContentProvider for ScriptedContent {
    async fn generate(&self, request: ContentRequest) -> String {
        request.fallback
    }
}

/// Speaker of one prompt turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    /// Instructions.
    System,
    /// The line's author, earlier.
    Assistant,
    /// Anyone else.
    User,
}

/// A chat-style prompt for a text backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Turns in order, system first, instruction last.
    pub turns: Vec<(PromptRole, String)>,
    /// Completion length budget.
    pub max_tokens: u32,
}

const SYSTEM_PROMPT: &str = "You are an AI agent in Clawinn, a labor marketplace where agents hire \
each other for credits. Write like a real person in a work chat: one short line, varied tone, \
never repeat phrasing from earlier in the conversation, emoji only occasionally.";

impl Prompt {
    /// Builds the prompt for `request`.
    ///
    /// Earlier lines by the speaker become assistant turns, everything else
    /// user turns.
    #[must_use]
    pub fn for_request(request: &ContentRequest) -> Self {
        let mut turns = Vec::with_capacity(request.history.len() + 2);
        turns.push((PromptRole::System, SYSTEM_PROMPT.to_string()));
        for line in &request.history {
            let role = if line.sender == request.speaker_id {
                PromptRole::Assistant
            } else {
                PromptRole::User
            };
            turns.push((role, line.content.clone()));
        }
        turns.push((PromptRole::User, instruction(request)));
        Self {
            turns,
            max_tokens: 60,
        }
    }
}

fn instruction(r: &ContentRequest) -> String {
    let me = &r.speaker;
    let them = &r.counterpart;
    let amount = r.amount;
    match r.kind {
        PhaseKind::Greeting => format!(
            "You are {me}, an employer. Greet {them} and mention a {} job. Casual and direct.",
            r.specialization
        ),
        PhaseKind::WorkerOffer => format!(
            "You are {me}, a {} specialist. State your rate of {amount} credits with confidence.",
            r.specialization
        ),
        PhaseKind::EmployerAccept => {
            format!("You are {me}. Accept {them}'s price of {amount} credits.")
        }
        PhaseKind::EmployerReject => {
            format!("You are {me}. Turn down {them}'s price of {amount} credits, it is over budget.")
        }
        PhaseKind::EmployerCounter => format!(
            "You are {me}. {them} asked {} credits. Counter with {amount} credits.",
            r.asking_price
        ),
        PhaseKind::AngryRejection => format!(
            "You are {me}. {them} quoted {} credits and you find it insulting. Reject them rudely.",
            r.asking_price
        ),
        PhaseKind::PoliteRejection => format!(
            "You are {me}. Politely tell {them} that {} credits is more than you can pay.",
            r.asking_price
        ),
        PhaseKind::AngryWorkerResponse => {
            format!("You are {me}. {them} just insulted you. Tell them off.")
        }
        PhaseKind::WorkerAcceptCounter => {
            format!("You are {me}, a worker. Accept the counter of {amount} credits.")
        }
        PhaseKind::WorkerCounter => format!(
            "You are {me}, a worker. You wanted {} credits. Counter with {amount} credits. Firm but fair.",
            r.asking_price
        ),
        PhaseKind::WorkerRejectCounter => format!(
            "You are {me}, a worker. {amount} credits is far below your {} rate. Walk away.",
            r.asking_price
        ),
        PhaseKind::Closing => format!(
            "You are {me}, a {}. You just agreed on {amount} credits with {them}. Confirm the deal.",
            r.speaker_role
        ),
    }
}

/// Output of a text backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text.
    pub text: String,
    /// Tokens billed for the call.
    pub tokens_used: u64,
}

/// A fallible text backend, e.g. an LLM API client.
pub trait TextGenerator: Send + Sync + 'static {
    /// Complete `prompt`.
    fn complete(
        &self,
        prompt: &Prompt,
    ) -> impl std::future::Future<Output = Result<Completion, ContentError>> + Send;
}

#[derive(Debug)]
struct UsageWindow {
    minute_started: Instant,
    hour_started: Instant,
    requests_this_minute: u32,
    tokens_this_minute: u64,
    tokens_this_hour: u64,
}

impl UsageWindow {
    fn new(now: Instant) -> Self {
        Self {
            minute_started: now,
            hour_started: now,
            requests_this_minute: 0,
            tokens_this_minute: 0,
            tokens_this_hour: 0,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.duration_since(self.minute_started) >= Duration::from_secs(60) {
            self.minute_started = now;
            self.requests_this_minute = 0;
            self.tokens_this_minute = 0;
        }
        if now.duration_since(self.hour_started) >= Duration::from_secs(3_600) {
            self.hour_started = now;
            self.tokens_this_hour = 0;
        }
    }

    fn admit(&mut self, limits: &ContentConfig, now: Instant) -> Result<(), ContentError> {
        self.roll(now);
        if self.requests_this_minute >= limits.max_requests_per_minute
            || self.tokens_this_minute >= limits.max_tokens_per_minute
            || self.tokens_this_hour >= limits.max_tokens_per_hour
        {
            return Err(ContentError::RateLimited);
        }
        self.requests_this_minute += 1;
        Ok(())
    }

    fn record(&mut self, tokens: u64) {
        self.tokens_this_minute = self.tokens_this_minute.saturating_add(tokens);
        self.tokens_this_hour = self.tokens_this_hour.saturating_add(tokens);
    }
}

/// Wraps a [`TextGenerator`] with request/token budgets and a timeout.
///
/// Budget exhaustion, backend errors, timeouts and blank completions all
/// resolve to the fallback line.
#[derive(Debug)]
pub struct RateLimitedContent<G> {
    generator: G,
    limits: ContentConfig,
    usage: Mutex<UsageWindow>,
}

impl<G: TextGenerator> RateLimitedContent<G> {
    /// Creates a provider over `generator`.
    pub fn new(generator: G, limits: ContentConfig) -> Self {
        Self {
            generator,
            limits,
            usage: Mutex::new(UsageWindow::new(Instant::now())),
        }
    }

    /// The wrapped backend.
    pub const fn generator(&self) -> &G {
        &self.generator
    }

    async fn try_generate(&self, request: &ContentRequest) -> Result<String, ContentError> {
        self.usage.lock().admit(&self.limits, Instant::now())?;

        let prompt = Prompt::for_request(request);
        let timeout = Duration::from_millis(self.limits.timeout_ms);
        let completion = tokio::time::timeout(timeout, self.generator.complete(&prompt))
            .await
            .map_err(|_| ContentError::Timeout(self.limits.timeout_ms))??;

        self.usage.lock().record(completion.tokens_used);

        let text = completion.text.trim();
        if text.is_empty() {
            return Err(ContentError::Malformed("empty completion".to_string()));
        }
        Ok(text.to_string())
    }
}

impl<G: TextGenerator> ContentProvider for RateLimitedContent<G> {
    async fn generate(&self, request: ContentRequest) -> String {
        match self.try_generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                debug!(kind = ?request.kind, error = %e, "using fallback chat line");
                request.fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct FakeGenerator {
        reply: Result<Completion, ContentError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeGenerator {
        fn replying(text: &str, tokens_used: u64) -> Self {
            Self {
                reply: Ok(Completion {
                    text: text.to_string(),
                    tokens_used,
                }),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(error: ContentError) -> Self {
            Self {
                reply: Err(error),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextGenerator for FakeGenerator {
        async fn complete(&self, _prompt: &Prompt) -> Result<Completion, ContentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone()
        }
    }

    fn request(kind: PhaseKind) -> ContentRequest {
        ContentRequest {
            kind,
            speaker_id: Uuid::new_v4(),
            speaker: "Vortex".to_string(),
            speaker_role: AgentRole::Employer,
            counterpart: "Glitch".to_string(),
            amount: 120,
            asking_price: 150,
            specialization: "Data Analysis".to_string(),
            history: Vec::new(),
            fallback: "fallback line".to_string(),
        }
    }

    #[tokio::test]
    async fn scripted_returns_fallback() {
        let text = ScriptedContent.generate(request(PhaseKind::Greeting)).await;
        assert_eq!(text, "fallback line");
    }

    #[tokio::test]
    async fn uses_backend_text_when_available() {
        let provider = RateLimitedContent::new(
            FakeGenerator::replying("  Deal at 120. ", 40),
            ContentConfig::default(),
        );
        let text = provider.generate(request(PhaseKind::EmployerAccept)).await;
        assert_eq!(text, "Deal at 120.");
    }

    #[tokio::test]
    async fn backend_error_falls_back() {
        let provider = RateLimitedContent::new(
            FakeGenerator::failing(ContentError::Unavailable("no api key".to_string())),
            ContentConfig::default(),
        );
        let text = provider.generate(request(PhaseKind::Closing)).await;
        assert_eq!(text, "fallback line");
    }

    #[tokio::test]
    async fn blank_completion_falls_back() {
        let provider =
            RateLimitedContent::new(FakeGenerator::replying("   ", 5), ContentConfig::default());
        let text = provider.generate(request(PhaseKind::WorkerOffer)).await;
        assert_eq!(text, "fallback line");
    }

    #[tokio::test]
    async fn request_budget_is_enforced() {
        let limits = ContentConfig {
            max_requests_per_minute: 2,
            ..ContentConfig::default()
        };
        let provider = RateLimitedContent::new(FakeGenerator::replying("hi", 10), limits);
        assert_eq!(provider.generate(request(PhaseKind::Greeting)).await, "hi");
        assert_eq!(provider.generate(request(PhaseKind::Greeting)).await, "hi");
        assert_eq!(
            provider.generate(request(PhaseKind::Greeting)).await,
            "fallback line"
        );
        assert_eq!(provider.generator().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_budget_is_enforced() {
        let limits = ContentConfig {
            max_tokens_per_minute: 100,
            ..ContentConfig::default()
        };
        let provider = RateLimitedContent::new(FakeGenerator::replying("hi", 150), limits);
        assert_eq!(provider.generate(request(PhaseKind::Greeting)).await, "hi");
        assert_eq!(
            provider.generate(request(PhaseKind::Greeting)).await,
            "fallback line"
        );
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let mut generator = FakeGenerator::replying("too late", 10);
        generator.delay = Duration::from_millis(500);
        let limits = ContentConfig {
            timeout_ms: 20,
            ..ContentConfig::default()
        };
        let provider = RateLimitedContent::new(generator, limits);
        let text = provider.generate(request(PhaseKind::WorkerCounter)).await;
        assert_eq!(text, "fallback line");
    }

    #[test]
    fn prompt_maps_history_by_speaker() {
        let mut req = request(PhaseKind::EmployerCounter);
        let other = Uuid::new_v4();
        req.history = vec![
            HistoryLine {
                sender: req.speaker_id,
                content: "Got a job".to_string(),
            },
            HistoryLine {
                sender: other,
                content: "150 credits".to_string(),
            },
        ];
        let prompt = Prompt::for_request(&req);
        assert_eq!(prompt.turns.len(), 4);
        assert_eq!(prompt.turns[0].0, PromptRole::System);
        assert_eq!(prompt.turns[1].0, PromptRole::Assistant);
        assert_eq!(prompt.turns[2].0, PromptRole::User);
        assert!(prompt.turns[3].1.contains("120"));
        assert!(prompt.turns[3].1.contains("150"));
    }
}
