//! Batch-scoped side-effect suppression
//!
//! Workflow enforcement, change notifications and dictionary cache batching
//! are host-wide switches. The driver enters each one through a
//! [`SuppressionGuard`] and the guard leaves it again on every exit path.
//!
//! The switches are shared by the whole host, so two imports must not hold
//! them at the same time. Coordinating that is up to the caller.

use anyhow::Result;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Host-wide switch held for the duration of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toggle {
    /// Workflow state enforcement disabled
    Workflow,
    /// Change notification events disabled
    Events,
    /// Dictionary cache writes batched
    DictionaryBatch,
}

impl std::fmt::Display for Toggle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Toggle::Workflow => "workflow",
            Toggle::Events => "events",
            Toggle::DictionaryBatch => "dictionary batch",
        };
        f.write_str(name)
    }
}

/// Host collaborator owning the switches
pub trait SideEffects: Send + Sync {
    /// Enter a switch
    fn enter(&self, toggle: Toggle) -> Result<()>;

    /// Leave a switch entered earlier
    fn exit(&self, toggle: Toggle) -> Result<()>;

    /// Drop derived text the import may have made stale
    fn reset_text_cache(&self);
}

/// Holds a switch until dropped
pub struct SuppressionGuard<'a> {
    effects: &'a dyn SideEffects,
    toggle: Toggle,
}

impl<'a> SuppressionGuard<'a> {
    /// Enter `toggle`; nothing is held if entering fails
    pub fn enter(effects: &'a dyn SideEffects, toggle: Toggle) -> Result<Self> {
        effects.enter(toggle)?;
        tracing::debug!(%toggle, "Entered suppression");
        Ok(Self { effects, toggle })
    }

    /// The switch this guard holds
    pub fn toggle(&self) -> Toggle {
        self.toggle
    }
}

impl Drop for SuppressionGuard<'_> {
    fn drop(&mut self) {
        // Leaving must never mask the batch outcome
        if let Err(e) = self.effects.exit(self.toggle) {
            tracing::warn!(toggle = %self.toggle, "Failed to leave suppression: {:#}", e);
        }
    }
}

/// Host without any switches
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSideEffects;

impl SideEffects for NoSideEffects {
    fn enter(&self, _toggle: Toggle) -> Result<()> {
        Ok(())
    }

    fn exit(&self, _toggle: Toggle) -> Result<()> {
        Ok(())
    }

    fn reset_text_cache(&self) {}
}

/// Counting switches for a single host process
///
/// Entering nests; a switch is active while its count is above zero.
#[derive(Debug, Default)]
pub struct ProcessToggles {
    workflow: AtomicUsize,
    events: AtomicUsize,
    batch: AtomicUsize,
    text_cache_generation: AtomicU64,
}

impl ProcessToggles {
    /// All switches off
    pub fn new() -> Self {
        Self::default()
    }

    /// True while at least one holder has entered `toggle`
    pub fn is_active(&self, toggle: Toggle) -> bool {
        self.counter(toggle).load(Ordering::SeqCst) > 0
    }

    /// Bumped on every text cache reset
    pub fn text_cache_generation(&self) -> u64 {
        self.text_cache_generation.load(Ordering::SeqCst)
    }

    fn counter(&self, toggle: Toggle) -> &AtomicUsize {
        match toggle {
            Toggle::Workflow => &self.workflow,
            Toggle::Events => &self.events,
            Toggle::DictionaryBatch => &self.batch,
        }
    }
}

impl SideEffects for ProcessToggles {
    fn enter(&self, toggle: Toggle) -> Result<()> {
        self.counter(toggle).fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exit(&self, toggle: Toggle) -> Result<()> {
        self.counter(toggle)
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| count.checked_sub(1))
            .map(|_| ())
            .map_err(|_| anyhow::anyhow!("Switch '{}' was not entered", toggle))
    }

    fn reset_text_cache(&self) {
        self.text_cache_generation.fetch_add(1, Ordering::SeqCst);
    }
}
