//! Docker Swarm queries and output parsing.

use super::report::ClusterRole;

pub const HOSTNAME_PROGRAM: &str = "hostname";

/// `docker node ls` printing "<self> <manager status>" per node
pub const NODE_LIST_ARGS: &[&str] = &["node", "ls", "--format", "{{.Self}} {{.ManagerStatus}}"];

/// `docker info` printing the local swarm state
pub const SWARM_STATE_ARGS: &[&str] = &["info", "--format", "{{.Swarm.LocalNodeState}}"];

const SELF_MARKER: &str = "true";
const LEADER_MARKER: &str = "Leader";
const ACTIVE_STATE: &str = "active";

/// Classify this node from `docker node ls` output.
///
/// The self record is the line whose first token is `true`. Without one the
/// role is unknown.
pub fn parse_role(node_list: &str) -> ClusterRole {
    let self_record = node_list
        .lines()
        .find(|line| line.split_whitespace().next() == Some(SELF_MARKER));

    match self_record {
        Some(line) if line.contains(LEADER_MARKER) => ClusterRole::Manager,
        Some(_) => ClusterRole::Worker,
        None => ClusterRole::Unknown,
    }
}

/// Whether `docker info` reports this node as an active swarm member.
pub fn parse_swarm_active(state: &str) -> bool {
    state.trim() == ACTIVE_STATE
}
