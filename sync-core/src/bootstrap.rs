//! Bootstrap state machine for itemsync.
//!
//! This module provides a pure, side-effect-free state machine for the
//! bootstrap pipeline: zone, then root record, then share, then ready. The
//! state machine takes events as input and produces a new state plus a list
//! of actions to execute.
//!
//! The actual I/O (listing zones, fetching and saving records) is performed
//! by sync-client, not by this module.

use itemsync_types::{Record, Share, Zone};

/// Everything item operations need once the pipeline completed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyContext {
    /// Zone holding all item records.
    pub zone: Zone,
    /// Root-sharing record every shared item descends from.
    pub root: Record,
    /// Share bound to the root record.
    pub share: Share,
}

/// A step of the bootstrap pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStep {
    /// Ensure the items zone exists.
    Zone,
    /// Resolve or create the root-sharing record.
    Root,
    /// Resolve or create the share.
    Share,
}

impl std::fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BootstrapStep::Zone => "zone",
            BootstrapStep::Root => "root record",
            BootstrapStep::Share => "share",
        };
        f.write_str(name)
    }
}

/// Coarse phase of the pipeline, for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    /// Nothing resolved yet.
    Uninitialized,
    /// Zone resolved.
    ZoneReady,
    /// Root record resolved.
    RootReady,
    /// Share resolved.
    ShareReady,
    /// Item operations may run.
    Ready,
    /// A step exhausted its retries.
    Failed,
}

/// Bootstrap state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BootstrapState {
    /// Nothing resolved yet.
    #[default]
    Uninitialized,
    /// The items zone exists.
    ZoneReady {
        /// The resolved zone.
        zone: Zone,
    },
    /// The root record exists.
    RootReady {
        /// The resolved zone.
        zone: Zone,
        /// The resolved root record.
        root: Record,
        /// Share created together with the root, if it was just created.
        known_share: Option<Share>,
    },
    /// The share exists; about to become ready.
    ShareReady(ReadyContext),
    /// Item operations may run.
    Ready(ReadyContext),
    /// A step failed; `Start` resumes from `resume`.
    Failed {
        /// The step that failed.
        step: BootstrapStep,
        /// Error message describing the failure.
        error: String,
        /// Last state reached before the failure.
        resume: Box<BootstrapState>,
    },
}

impl BootstrapState {
    /// Create a new state machine in the Uninitialized state.
    pub fn new() -> Self {
        Self::Uninitialized
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            (Self::Failed { resume, .. }, Event::Start) => {
                let state = *resume;
                let actions = state.next_action().into_iter().collect();
                (state, actions)
            }
            (state, Event::Start) => {
                let actions = state.next_action().into_iter().collect();
                (state, actions)
            }

            (Self::Uninitialized, Event::ZoneEnsured { zone }) => (
                Self::ZoneReady { zone: zone.clone() },
                vec![
                    Action::EmitEvent(BootstrapEvent::StepCompleted(BootstrapStep::Zone)),
                    Action::EnsureRoot { zone },
                ],
            ),

            (Self::ZoneReady { zone }, Event::RootEnsured { root, share }) => (
                Self::RootReady {
                    zone,
                    root: root.clone(),
                    known_share: share.clone(),
                },
                vec![
                    Action::EmitEvent(BootstrapEvent::StepCompleted(BootstrapStep::Root)),
                    Action::EnsureShare { root, known: share },
                ],
            ),

            (Self::RootReady { zone, root, .. }, Event::ShareEnsured { share }) => (
                Self::ShareReady(ReadyContext { zone, root, share }),
                vec![
                    Action::EmitEvent(BootstrapEvent::StepCompleted(BootstrapStep::Share)),
                    Action::CompleteBootstrap,
                ],
            ),

            (Self::ShareReady(context), Event::BootstrapCompleted) => (
                Self::Ready(context),
                vec![
                    Action::FlushReadyQueue,
                    Action::EmitEvent(BootstrapEvent::Ready),
                ],
            ),

            (
                state @ (Self::Uninitialized | Self::ZoneReady { .. } | Self::RootReady { .. }),
                Event::StepFailed { step, error },
            ) => (
                Self::Failed {
                    step,
                    error: error.clone(),
                    resume: Box::new(state),
                },
                vec![Action::EmitEvent(BootstrapEvent::Stalled { step, error })],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// The action that moves this state forward, if any.
    fn next_action(&self) -> Option<Action> {
        match self {
            Self::Uninitialized => Some(Action::EnsureZone),
            Self::ZoneReady { zone } => Some(Action::EnsureRoot { zone: zone.clone() }),
            Self::RootReady {
                root, known_share, ..
            } => Some(Action::EnsureShare {
                root: root.clone(),
                known: known_share.clone(),
            }),
            Self::ShareReady(_) => Some(Action::CompleteBootstrap),
            Self::Ready(_) | Self::Failed { .. } => None,
        }
    }

    /// Coarse phase of this state.
    pub fn phase(&self) -> BootstrapPhase {
        match self {
            Self::Uninitialized => BootstrapPhase::Uninitialized,
            Self::ZoneReady { .. } => BootstrapPhase::ZoneReady,
            Self::RootReady { .. } => BootstrapPhase::RootReady,
            Self::ShareReady(_) => BootstrapPhase::ShareReady,
            Self::Ready(_) => BootstrapPhase::Ready,
            Self::Failed { .. } => BootstrapPhase::Failed,
        }
    }

    /// Check if item operations may run.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The ready context, once ready.
    pub fn context(&self) -> Option<&ReadyContext> {
        match self {
            Self::Ready(context) => Some(context),
            _ => None,
        }
    }

    /// The resolved zone, from ZoneReady onwards.
    pub fn zone(&self) -> Option<&Zone> {
        match self {
            Self::Uninitialized => None,
            Self::ZoneReady { zone } | Self::RootReady { zone, .. } => Some(zone),
            Self::ShareReady(context) | Self::Ready(context) => Some(&context.zone),
            Self::Failed { resume, .. } => resume.zone(),
        }
    }
}

/// Events that drive the bootstrap pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Start (or resume) the pipeline.
    Start,
    /// The items zone exists.
    ZoneEnsured {
        /// The resolved zone.
        zone: Zone,
    },
    /// The root record exists.
    RootEnsured {
        /// The resolved root record.
        root: Record,
        /// Share created in the same batch, if the root was just created.
        share: Option<Share>,
    },
    /// The share exists.
    ShareEnsured {
        /// The resolved share.
        share: Share,
    },
    /// The ShareReady state was acknowledged.
    BootstrapCompleted,
    /// A step gave up.
    StepFailed {
        /// The failing step.
        step: BootstrapStep,
        /// Error message describing the failure.
        error: String,
    },
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects. The sync-client interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Find or create the items zone.
    EnsureZone,
    /// Resolve or create the root record in `zone`.
    EnsureRoot {
        /// Zone the root record lives in.
        zone: Zone,
    },
    /// Resolve or create the share bound to `root`.
    EnsureShare {
        /// The root record.
        root: Record,
        /// Share created together with the root, if any.
        known: Option<Share>,
    },
    /// Acknowledge ShareReady and move to Ready.
    CompleteBootstrap,
    /// Run every callback queued while not ready.
    FlushReadyQueue,
    /// Emit an event to the application.
    EmitEvent(BootstrapEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapEvent {
    /// A step finished successfully.
    StepCompleted(BootstrapStep),
    /// The pipeline reached Ready.
    Ready,
    /// A step failed and the pipeline stopped.
    Stalled {
        /// The failing step.
        step: BootstrapStep,
        /// Error message describing the failure.
        error: String,
    },
}
