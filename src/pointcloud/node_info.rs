//! Per-node state machine for the point cloud pipeline.
//! Legal transitions are enforced at the type level: [`NodeInfo::transition`]
//! rejects anything not in the table with a [`EngineError::Programmer`],
//! matching the error taxonomy's "illegal state transition" case.

use std::time::Instant;

use crate::error::{programmer_error, EngineError, Result};

use super::source::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Empty,
    Hidden,
    Loading,
    Displayed,
}

fn is_legal(from: NodeState, to: NodeState) -> bool {
    use NodeState::*;
    matches!(
        (from, to),
        (Empty, Loading)
            | (Loading, Empty)
            | (Loading, Displayed)
            | (Loading, Loading) // attribute hot-swap self-transition
            | (Displayed, Hidden)
            | (Displayed, Loading)
            | (Hidden, Displayed)
            | (Hidden, Loading)
            | (Hidden, Empty)
    )
}

pub struct NodeInfo {
    pub node: u64,
    pub state: NodeState,
    pub state_timestamp: Instant,
    pub mesh_exists: bool,
    pub position_dirty: bool,
    pub token: Option<CancellationToken>,
    pub point_count: u64,
}

impl NodeInfo {
    pub fn new(node: u64) -> Self {
        Self { node, state: NodeState::Empty, state_timestamp: Instant::now(), mesh_exists: false, position_dirty: true, token: None, point_count: 0 }
    }

    /// Applies `to`, running the post-transition effects. Returns `Err`
    /// (without mutating state) on an illegal transition.
    pub fn transition(&mut self, to: NodeState) -> Result<()> {
        if !is_legal(self.state, to) {
            return Err(programmer_error!("illegal point cloud node transition {:?} -> {:?}", self.state, to));
        }
        self.state = to;
        self.state_timestamp = Instant::now();

        match to {
            NodeState::Hidden => {
                self.abort();
            }
            NodeState::Displayed => {
                self.abort();
            }
            NodeState::Empty => {
                self.abort();
                self.mesh_exists = false;
            }
            NodeState::Loading => {
                self.abort();
                self.token = Some(CancellationToken::default());
            }
        }
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }

    /// `true` iff a position payload should be requested alongside this
    /// load: either the mesh doesn't exist yet, or it was explicitly marked
    /// dirty (camera-driven re-center, source update).
    pub fn needs_position(&self) -> bool {
        !self.mesh_exists || self.position_dirty
    }

    /// `setActiveAttribute`: never reloads positions. `Displayed`/`Loading`
    /// re-enter `Loading` with `position_dirty=false`; `Hidden` drops to
    /// `Empty` since its data is obsolete anyway; `Empty` stays put.
    pub fn set_active_attribute(&mut self) -> Result<()> {
        match self.state {
            NodeState::Displayed | NodeState::Loading => {
                self.position_dirty = false;
                self.transition(NodeState::Loading)
            }
            NodeState::Hidden => self.transition(NodeState::Empty),
            NodeState::Empty => Ok(()),
        }
    }

    /// Hysteresis sweep (polled every 1s): a `Hidden` node older
    /// than `cleanup_delay` since its last transition drops to `Empty`.
    pub fn sweep_hidden(&mut self, cleanup_delay: std::time::Duration) -> Result<bool> {
        if self.state == NodeState::Hidden && self.state_timestamp.elapsed() > cleanup_delay {
            self.transition(NodeState::Empty)?;
            return Ok(true);
        }
        Ok(false)
    }
}

/// `decimation = clamp(floor(total_points / budget), 1, +inf)`; `None`
/// budget leaves decimation user-controlled (returns `None`).
pub fn compute_decimation(total_visible_points: u64, point_budget: Option<u64>) -> Option<u64> {
    let budget = point_budget?;
    if budget == 0 {
        return Some(u64::MAX);
    }
    Some((total_visible_points / budget).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions_succeed() {
        let mut n = NodeInfo::new(1);
        n.transition(NodeState::Loading).unwrap();
        n.transition(NodeState::Displayed).unwrap();
        n.transition(NodeState::Hidden).unwrap();
        n.transition(NodeState::Loading).unwrap();
    }

    #[test]
    fn illegal_transition_is_rejected_and_state_unchanged() {
        let mut n = NodeInfo::new(1);
        let err = n.transition(NodeState::Displayed).unwrap_err();
        assert!(err.is_definitive());
        assert_eq!(n.state, NodeState::Empty);
    }

    #[test]
    fn empty_to_empty_is_illegal() {
        let mut n = NodeInfo::new(1);
        assert!(n.transition(NodeState::Empty).is_err());
    }

    #[test]
    fn decimation_respects_budget() {
        assert_eq!(compute_decimation(10_000_000, Some(2_000_000)), Some(5));
        assert_eq!(compute_decimation(1_000_000, Some(2_000_000)), Some(1));
        assert_eq!(compute_decimation(1_000, None), None);
    }
}
