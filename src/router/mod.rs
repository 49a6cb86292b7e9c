//! Query router
//!
//! Classifies a question, dispatches the selected tools concurrently and hands the
//! invocations to the synthesizer. Collaborators are injected through
//! `RouterBuilder`; the router itself holds no mutable state and is shared behind
//! `Arc`.

mod cancel;
mod classify;
mod dispatch;
mod fallback;
mod state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagsqlError, Result, ToolFailure};
use crate::question::Question;
use crate::synth::{Answer, Synthesizer};
use crate::tools::{Capability, QueryTool, ToolInvocation, ToolRegistry};

pub use cancel::CancelToken;
pub use classify::{Classification, Classifier, RoutingPolicy, RoutingTier, Signals, proper_names};
pub use dispatch::dispatch_all;
pub use fallback::{LlmRouteClassifier, parse_route};
pub use state::{QueryLifecycle, QueryState};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_millis(5000);
const LLM_CONFIDENCE: f32 = 0.5;

/// Which tools a question goes to, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Selected tool ids in registry order; never empty
    pub tool_ids: Vec<String>,
    pub capabilities: Vec<Capability>,
    pub rationale: String,
    pub confidence: f32,
    pub tier: RoutingTier,
}

/// Builder for `Router`
pub struct RouterBuilder {
    registry: Arc<ToolRegistry>,
    tools: Vec<Arc<dyn QueryTool>>,
    classifier: Option<Classifier>,
    fallback: Option<LlmRouteClassifier>,
    synthesizer: Option<Synthesizer>,
    tool_timeout: Duration,
}

impl RouterBuilder {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            tools: Vec::new(),
            classifier: None,
            fallback: None,
            synthesizer: None,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Bind a tool implementation to its registry id
    pub fn with_tool(mut self, tool: Arc<dyn QueryTool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Ask an LLM when the rules find no signal
    pub fn with_fallback(mut self, fallback: LlmRouteClassifier) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Synthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Router> {
        let mut tools = HashMap::new();
        for tool in self.tools {
            let id = tool.id().to_string();
            self.registry.get(&id)?;
            if tools.insert(id.clone(), tool).is_some() {
                return Err(RagsqlError::DuplicateToolId(id));
            }
        }

        let classifier = match self.classifier {
            Some(c) => c,
            None => Classifier::new(&RoutingPolicy::default())?,
        };
        let synthesizer = self
            .synthesizer
            .unwrap_or_else(|| Synthesizer::new(self.registry.clone()));

        Ok(Router {
            registry: self.registry,
            tools,
            classifier,
            fallback: self.fallback,
            synthesizer,
            tool_timeout: self.tool_timeout,
        })
    }
}

/// Classifies, dispatches and synthesizes
pub struct Router {
    registry: Arc<ToolRegistry>,
    tools: HashMap<String, Arc<dyn QueryTool>>,
    classifier: Classifier,
    fallback: Option<LlmRouteClassifier>,
    synthesizer: Synthesizer,
    tool_timeout: Duration,
}

impl Router {
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }

    /// Rule-based classification; pure
    pub fn classify(&self, text: &str) -> Classification {
        self.classifier.classify(text)
    }

    /// Bound tools serving any of `capabilities`, in registry order
    fn select(&self, capabilities: &[Capability]) -> Vec<String> {
        self.registry
            .list()
            .iter()
            .filter(|d| self.tools.contains_key(&d.id))
            .filter(|d| capabilities.iter().any(|c| d.has_capability(*c)))
            .map(|d| d.id.clone())
            .collect()
    }

    /// Decide which tools answer `question`
    pub async fn route(&self, question: &Question) -> Result<RoutingDecision> {
        let classification = self.classify(question.text());
        let mut capabilities = classification.capabilities;
        let mut tier = classification.tier;
        let mut confidence = classification.confidence;
        let mut rationale = classification.rationale;

        if tier == RoutingTier::Default {
            if let Some(fallback) = &self.fallback {
                if let Some(caps) = fallback.classify(question.text()).await {
                    rationale = format!(
                        "llm fallback chose {}",
                        caps.iter().map(ToString::to_string).collect::<Vec<_>>().join(" and ")
                    );
                    capabilities = caps;
                    tier = RoutingTier::Llm;
                    confidence = LLM_CONFIDENCE;
                }
            }
        }

        let tool_ids = self.select(&capabilities);
        if tool_ids.is_empty() {
            let wanted: Vec<String> = capabilities.iter().map(ToString::to_string).collect();
            return Err(RagsqlError::UnknownTool(format!(
                "no bound tool provides {}",
                wanted.join(" or ")
            )));
        }

        log::info!(
            "{}: routed to [{}] ({} tier, confidence {:.2}): {}",
            question.id(),
            tool_ids.join(", "),
            tier,
            confidence,
            rationale
        );

        Ok(RoutingDecision {
            tool_ids,
            capabilities,
            rationale,
            confidence,
            tier,
        })
    }

    /// Decision for tools named by the caller; every id must be registered and bound
    pub fn explicit(&self, tool_ids: &[String]) -> Result<RoutingDecision> {
        if tool_ids.is_empty() {
            return Err(RagsqlError::UnknownTool("no tool selected".to_string()));
        }

        let mut ordered: Vec<(usize, String)> = Vec::new();
        let mut capabilities = Vec::new();
        for id in tool_ids {
            let descriptor = self.registry.get(id)?;
            if !self.tools.contains_key(id) {
                return Err(RagsqlError::UnknownTool(id.clone()));
            }
            if ordered.iter().any(|(_, seen)| seen == id) {
                continue;
            }
            ordered.push((self.registry.position(id).unwrap_or(usize::MAX), id.clone()));
            for cap in &descriptor.capabilities {
                if !capabilities.contains(cap) {
                    capabilities.push(*cap);
                }
            }
        }
        ordered.sort_by_key(|(pos, _)| *pos);
        capabilities.sort_by_key(|c| *c != Capability::Structured);

        Ok(RoutingDecision {
            tool_ids: ordered.into_iter().map(|(_, id)| id).collect(),
            capabilities,
            rationale: "tools named explicitly".to_string(),
            confidence: 1.0,
            tier: RoutingTier::Explicit,
        })
    }

    /// Invoke the decision's tools concurrently under the tool timeout
    pub async fn dispatch(
        &self,
        question: &Question,
        decision: &RoutingDecision,
        cancel: &CancelToken,
    ) -> Result<Vec<ToolInvocation>> {
        let mut calls = Vec::with_capacity(decision.tool_ids.len());
        for id in &decision.tool_ids {
            let tool = self
                .tools
                .get(id)
                .ok_or_else(|| RagsqlError::UnknownTool(id.clone()))?;
            calls.push((tool.clone(), tool.prepare(question)));
        }
        dispatch_all(calls, self.tool_timeout, cancel).await
    }

    /// Route and answer a question
    pub async fn answer(&self, question: &Question, cancel: &CancelToken) -> Result<Answer> {
        let decision = self.route(question).await?;
        self.answer_with(question, &decision, cancel).await
    }

    /// Answer with a decision made elsewhere, e.g. `explicit`
    pub async fn answer_with(
        &self,
        question: &Question,
        decision: &RoutingDecision,
        cancel: &CancelToken,
    ) -> Result<Answer> {
        let mut lifecycle = QueryLifecycle::new(question.id());
        lifecycle.transition(QueryState::Classified)?;

        if decision.tool_ids.is_empty() {
            lifecycle.transition(QueryState::Failed)?;
            return Err(RagsqlError::UnknownTool("no tool selected".to_string()));
        }

        lifecycle.transition(QueryState::Dispatched)?;
        let invocations = match self.dispatch(question, decision, cancel).await {
            Ok(invocations) => invocations,
            Err(RagsqlError::Cancelled) => {
                lifecycle.transition(QueryState::Cancelled)?;
                return Err(RagsqlError::Cancelled);
            }
            Err(e) => {
                lifecycle.transition(QueryState::Failed)?;
                return Err(e);
            }
        };

        if let Some(failures) = all_unrecoverable(&invocations) {
            lifecycle.transition(QueryState::Failed)?;
            return Err(RagsqlError::AllToolsFailed(failures));
        }

        let answer = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            answer = self.synthesizer.merge(question, invocations) => Some(answer),
        };
        match answer {
            Some(answer) => {
                lifecycle.transition(QueryState::Completed)?;
                Ok(answer)
            }
            None => {
                lifecycle.transition(QueryState::Cancelled)?;
                Err(RagsqlError::Cancelled)
            }
        }
    }
}

/// Failures when every invocation failed unrecoverably
fn all_unrecoverable(invocations: &[ToolInvocation]) -> Option<Vec<ToolFailure>> {
    let mut failures = Vec::new();
    for inv in invocations {
        match &inv.outcome {
            Err(e) if !e.is_reportable() => failures.push(ToolFailure {
                tool_id: inv.tool_id.clone(),
                capability: inv.input.capability(),
                reason: e.to_string(),
            }),
            _ => return None,
        }
    }
    if failures.is_empty() { None } else { Some(failures) }
}
