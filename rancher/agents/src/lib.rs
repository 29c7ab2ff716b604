/*!

`rancher-agents` drives the lifecycle of a Rancher test environment: the server node running the
control plane and the agent nodes that register with it.

The controllers in [`server`] and [`agents`] only talk to the outside world through the
collaborators in a [`Toolkit`]: nodes are handled by a [`RemoteNodeAgent`], leftover cloud
resources by a [`CloudAccessor`] and an [`InfrastructureReaper`], and the control plane API by a
[`ControlPlane`].

!*/

pub mod agents;
pub mod control_plane;
pub mod docker_machine;
mod error;
pub mod node;
pub mod puppet;
pub mod server;

pub use agent_utils::aws::CloudAccessor;
use agent_utils::retry::Sleeper;
pub use agents::AgentsController;
pub use control_plane::ControlPlane;
pub use docker_machine::RemoteNodeAgent;
pub use error::{Error, Result};
pub use node::NodeState;
pub use puppet::InfrastructureReaper;
pub use server::ServerController;

/// The external systems a controller works with.
#[derive(Copy, Clone)]
pub struct Toolkit<'t> {
    pub machine: &'t dyn RemoteNodeAgent,
    pub cloud: &'t dyn CloudAccessor,
    pub control_plane: &'t dyn ControlPlane,
    pub reaper: &'t dyn InfrastructureReaper,
    /// Used for fixed waits outside of retried calls.
    pub sleeper: &'t dyn Sleeper,
}
