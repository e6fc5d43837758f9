//! Inspector pipeline for endpoint requests.
//!
//! Inspectors see every request before it reaches the operation and every
//! response after it leaves. They run in registration order in both phases
//! (the after phase is not reversed). Each inspector decides per request
//! whether it participates; when it does, whatever its before-hook returns
//! is handed back to its own after-hook for the same request and to no one
//! else.
//!
//! The pipeline is built once and shared by all requests. Per-request state
//! lives in the [`Correlations`] value returned by
//! [`InspectorPipeline::on_request`], never in the pipeline itself.

use std::any::Any;

use gatehouse_services::ScopeError;
use tracing::trace;

use crate::context::{RequestContext, ResponseContext};

/// Outcome of an inspector's before phase for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation<S> {
    /// The before-hook ran and produced this state for the after-hook.
    Ran(S),
    /// The inspector does not take part in this request; no after-hook.
    Skipped,
}

impl<S> Correlation<S> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn state(&self) -> Option<&S> {
        match self {
            Self::Ran(state) => Some(state),
            Self::Skipped => None,
        }
    }

    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> Correlation<T> {
        match self {
            Self::Ran(state) => Correlation::Ran(f(state)),
            Self::Skipped => Correlation::Skipped,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InspectorError {
    #[error("authentication failed for credential '{0}'")]
    Unauthenticated(String),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("invalid value for header '{0}'")]
    InvalidHeader(String),

    #[error("correlation state does not belong to this inspector")]
    StateMismatch,

    #[error("{0}")]
    Failed(String),
}

/// Which hook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    After,
}

/// An inspector error tagged with the inspector and hook that raised it.
#[derive(Debug, thiserror::Error)]
#[error("inspector '{inspector}' failed in {phase:?} phase: {source}")]
pub struct PipelineError {
    pub inspector: String,
    pub phase: Phase,
    #[source]
    pub source: InspectorError,
}

/// Trait for request/response inspectors.
pub trait Inspector: Send + Sync {
    /// State carried from [`before`](Inspector::before) to
    /// [`after`](Inspector::after) for one request.
    type State: Send + 'static;

    /// Inspector name for debugging.
    fn name(&self) -> &str;

    /// Whether the inspector needs a [`HandlerInstance`](crate::HandlerInstance)
    /// on the request. When it does and there is none, it is skipped.
    fn requires_instance(&self) -> bool {
        false
    }

    /// Per-request applicability. When false the before-hook is not called.
    fn applies_to(&self, _request: &RequestContext) -> bool {
        true
    }

    /// Runs before the operation. Returning [`Correlation::Skipped`] opts out
    /// of the after-hook for this request.
    fn before(&self, request: &RequestContext) -> Result<Correlation<Self::State>, InspectorError>;

    /// Runs on the outbound response with the state from `before`.
    fn after(
        &self,
        _response: &mut ResponseContext,
        _request: &RequestContext,
        _state: Self::State,
    ) -> Result<(), InspectorError> {
        Ok(())
    }
}

type ErasedState = Box<dyn Any + Send>;

/// Object-safe version of Inspector with the state type erased.
trait InspectorDyn: Send + Sync {
    fn name_dyn(&self) -> &str;
    fn participates_dyn(&self, request: &RequestContext) -> bool;
    fn before_dyn(&self, request: &RequestContext) -> Result<Correlation<ErasedState>, InspectorError>;
    fn after_dyn(
        &self,
        response: &mut ResponseContext,
        request: &RequestContext,
        state: ErasedState,
    ) -> Result<(), InspectorError>;
}

impl<T: Inspector> InspectorDyn for T {
    fn name_dyn(&self) -> &str {
        self.name()
    }

    fn participates_dyn(&self, request: &RequestContext) -> bool {
        if self.requires_instance() && request.instance().is_none() {
            return false;
        }
        self.applies_to(request)
    }

    fn before_dyn(&self, request: &RequestContext) -> Result<Correlation<ErasedState>, InspectorError> {
        Ok(self
            .before(request)?
            .map(|state| Box::new(state) as ErasedState))
    }

    fn after_dyn(
        &self,
        response: &mut ResponseContext,
        request: &RequestContext,
        state: ErasedState,
    ) -> Result<(), InspectorError> {
        let state = state
            .downcast::<T::State>()
            .map_err(|_| InspectorError::StateMismatch)?;
        self.after(response, request, *state)
    }
}

/// Per-request correlation slots, one per registered inspector, in
/// registration order.
#[derive(Default)]
pub struct Correlations {
    slots: Vec<Correlation<ErasedState>>,
}

impl Correlations {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of inspectors whose after-hook will run.
    pub fn ran(&self) -> usize {
        self.slots.iter().filter(|c| !c.is_skipped()).count()
    }

    pub fn is_skipped(&self, index: usize) -> bool {
        self.slots.get(index).is_none_or(Correlation::is_skipped)
    }
}

impl std::fmt::Debug for Correlations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|c| if c.is_skipped() { "Skipped" } else { "Ran" }))
            .finish()
    }
}

/// An ordered, immutable list of inspectors attached to one endpoint.
pub struct InspectorPipeline {
    inspectors: Vec<Box<dyn InspectorDyn>>,
}

impl InspectorPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// A pipeline with no inspectors.
    pub fn empty() -> Self {
        Self {
            inspectors: Vec::new(),
        }
    }

    /// Run the before phase. Stops at the first failing hook.
    pub fn on_request(&self, request: &RequestContext) -> Result<Correlations, PipelineError> {
        let mut slots = Vec::with_capacity(self.inspectors.len());

        for inspector in &self.inspectors {
            let name = inspector.name_dyn();
            if !inspector.participates_dyn(request) {
                trace!(inspector = name, "inspector not applicable");
                slots.push(Correlation::Skipped);
                continue;
            }

            let correlation = inspector.before_dyn(request).map_err(|source| PipelineError {
                inspector: name.to_string(),
                phase: Phase::Before,
                source,
            })?;
            trace!(inspector = name, skipped = correlation.is_skipped(), "before-hook ran");
            slots.push(correlation);
        }

        Ok(Correlations { slots })
    }

    /// Run the after phase in registration order, skipping inspectors that
    /// did not run for this request. Stops at the first failing hook.
    pub fn on_response(
        &self,
        response: &mut ResponseContext,
        request: &RequestContext,
        correlations: Correlations,
    ) -> Result<(), PipelineError> {
        for (inspector, correlation) in self.inspectors.iter().zip(correlations.slots) {
            let Correlation::Ran(state) = correlation else {
                continue;
            };

            inspector
                .after_dyn(response, request, state)
                .map_err(|source| PipelineError {
                    inspector: inspector.name_dyn().to_string(),
                    phase: Phase::After,
                    source,
                })?;
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.inspectors.iter().map(|i| i.name_dyn()).collect()
    }

    pub fn len(&self) -> usize {
        self.inspectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inspectors.is_empty()
    }
}

impl Default for InspectorPipeline {
    fn default() -> Self {
        Self::empty()
    }
}

/// Collects inspectors in the order they should run.
#[derive(Default)]
pub struct PipelineBuilder {
    inspectors: Vec<Box<dyn InspectorDyn>>,
}

impl PipelineBuilder {
    pub fn with<I: Inspector + 'static>(mut self, inspector: I) -> Self {
        self.inspectors.push(Box::new(inspector));
        self
    }

    pub fn build(self) -> InspectorPipeline {
        InspectorPipeline {
            inspectors: self.inspectors,
        }
    }
}
