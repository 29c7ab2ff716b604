/*!

In-memory stand-ins for the collaborators of the controllers, so that whole lifecycles can be
tested without a cloud account, `docker-machine` or a running control plane. Every fake records
what it was asked to do.

!*/

use agent_utils::aws::CloudAccessor;
use agent_utils::retry::{RetryError, RetryPolicy, Sleeper};
use rancher_agents::control_plane::{ApiError, AttemptError, HttpMethod};
use rancher_agents::docker_machine::{MachineError, NodeSpec, Removal};
use rancher_agents::puppet::PuppetError;
use rancher_agents::{ControlPlane, InfrastructureReaper, RemoteNodeAgent, Toolkit};
use rancher_types::NodeIdentity;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use url::Url;

pub(crate) const NODE_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

fn command_failed(hint: &str) -> agent_utils::Error {
    agent_utils::Error::CommandFailed {
        hint: hint.to_string(),
        code: 1,
        stderr: "simulated failure".to_string(),
        stdout: String::new(),
    }
}

/// The error a control plane request gives once every attempt saw `status`.
fn rejected(method: HttpMethod, url: &Url, policy: &RetryPolicy, status: u16) -> ApiError {
    ApiError::Request {
        method,
        url: url.to_string(),
        source: RetryError::Exhausted {
            what: format!("{} {}", method, url),
            attempts: policy.max_attempts(),
            source: AttemptError::Status {
                url: url.to_string(),
                status,
            },
        },
    }
}

/// Pretends to be `docker-machine`. Calls are recorded as `create <name>`, `ip <name>`,
/// `ssh <name> <command>` and `rm <name>`.
#[derive(Default)]
pub(crate) struct FakeMachine {
    pub(crate) calls: RefCell<Vec<String>>,
    pub(crate) specs: RefCell<Vec<NodeSpec>>,
    pub(crate) fail_create: Cell<bool>,
    pub(crate) fail_destroy: Cell<bool>,
    pub(crate) unknown_nodes: Cell<bool>,
    /// Remote commands containing this text fail.
    pub(crate) fail_commands_containing: RefCell<Option<String>>,
}

impl FakeMachine {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub(crate) fn commands_for(&self, name: &NodeIdentity) -> Vec<String> {
        let prefix = format!("ssh {} ", name);
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| call.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }
}

impl RemoteNodeAgent for FakeMachine {
    fn create(&self, name: &NodeIdentity, spec: &NodeSpec) -> Result<(), MachineError> {
        self.calls.borrow_mut().push(format!("create {}", name));
        self.specs.borrow_mut().push(spec.clone());
        if self.fail_create.get() {
            return Err(MachineError::Create {
                name: name.to_string(),
                source: command_failed("docker-machine create"),
            });
        }
        Ok(())
    }

    fn resolve_address(&self, name: &NodeIdentity) -> Result<IpAddr, MachineError> {
        self.calls.borrow_mut().push(format!("ip {}", name));
        Ok(NODE_ADDRESS)
    }

    fn run_command(&self, name: &NodeIdentity, command: &str) -> Result<String, MachineError> {
        self.calls
            .borrow_mut()
            .push(format!("ssh {} {}", name, command));
        if let Some(pattern) = self.fail_commands_containing.borrow().as_deref() {
            if command.contains(pattern) {
                return Err(MachineError::RemoteCommand {
                    name: name.to_string(),
                    command: command.to_string(),
                    source: RetryError::Exhausted {
                        what: format!("ssh {}", name),
                        attempts: RetryPolicy::default().max_attempts(),
                        source: command_failed("docker-machine ssh"),
                    },
                });
            }
        }
        Ok(String::new())
    }

    fn destroy(&self, name: &NodeIdentity) -> Result<Removal, MachineError> {
        self.calls.borrow_mut().push(format!("rm {}", name));
        if self.fail_destroy.get() {
            return Err(MachineError::Destroy {
                name: name.to_string(),
                source: command_failed("docker-machine rm"),
            });
        }
        if self.unknown_nodes.get() {
            return Ok(Removal::AlreadyAbsent);
        }
        Ok(Removal::Removed)
    }
}

#[derive(Default)]
pub(crate) struct FakeCloud {
    pub(crate) deleted_key_pairs: RefCell<Vec<String>>,
    pub(crate) fail: Cell<bool>,
}

impl CloudAccessor for FakeCloud {
    fn delete_key_pair(&self, name: &str) -> agent_utils::Result<()> {
        if self.fail.get() {
            return Err(command_failed("ec2 delete-key-pair"));
        }
        self.deleted_key_pairs.borrow_mut().push(name.to_string());
        Ok(())
    }
}

/// A control plane that answers readiness polls once it has been polled `ready_after` times.
/// GETs answer with the queued `token_listings`, then with an empty collection.
pub(crate) struct FakeControlPlane {
    pub(crate) ready_after: u32,
    pub(crate) polls: Cell<u32>,
    pub(crate) poll_policies: RefCell<Vec<RetryPolicy>>,
    /// Every GET, POST and PUT as `(method, url, payload, policy)`.
    pub(crate) requests: RefCell<Vec<(HttpMethod, String, Value, RetryPolicy)>>,
    pub(crate) token_response: Value,
    pub(crate) token_listings: RefCell<VecDeque<Value>>,
    pub(crate) fail_post: Cell<bool>,
    pub(crate) fail_put: Cell<bool>,
}

impl Default for FakeControlPlane {
    fn default() -> Self {
        Self {
            ready_after: 3,
            polls: Cell::new(0),
            poll_policies: RefCell::default(),
            requests: RefCell::default(),
            token_response: json!({
                "type": "registrationToken",
                "token": "0123456789ABCDEF",
            }),
            token_listings: RefCell::default(),
            fail_post: Cell::new(false),
            fail_put: Cell::new(false),
        }
    }
}

impl ControlPlane for FakeControlPlane {
    fn poll_until_ready(&self, url: &Url, policy: &RetryPolicy) -> Result<(), ApiError> {
        self.poll_policies.borrow_mut().push(*policy);
        for _ in 0..policy.max_attempts() {
            self.polls.set(self.polls.get() + 1);
            if self.polls.get() >= self.ready_after {
                return Ok(());
            }
        }
        Err(rejected(HttpMethod::Get, url, policy, 503))
    }

    fn get(&self, url: &Url, policy: &RetryPolicy) -> Result<Value, ApiError> {
        self.requests
            .borrow_mut()
            .push((HttpMethod::Get, url.to_string(), Value::Null, *policy));
        Ok(self
            .token_listings
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| json!({"type": "collection", "data": []})))
    }

    fn post(&self, url: &Url, payload: &Value, policy: &RetryPolicy) -> Result<Value, ApiError> {
        self.requests.borrow_mut().push((
            HttpMethod::Post,
            url.to_string(),
            payload.clone(),
            *policy,
        ));
        if self.fail_post.get() {
            return Err(rejected(HttpMethod::Post, url, policy, 500));
        }
        Ok(self.token_response.clone())
    }

    fn put(&self, url: &Url, payload: &Value, policy: &RetryPolicy) -> Result<Value, ApiError> {
        self.requests.borrow_mut().push((
            HttpMethod::Put,
            url.to_string(),
            payload.clone(),
            *policy,
        ));
        if self.fail_put.get() {
            return Err(rejected(HttpMethod::Put, url, policy, 500));
        }
        Ok(payload.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeReaper {
    /// `(name, region)` of every removal.
    pub(crate) removed: RefCell<Vec<(String, String)>>,
    pub(crate) fail: Cell<bool>,
}

impl InfrastructureReaper for FakeReaper {
    fn ensure_absent(&self, name: &NodeIdentity, region: &str) -> Result<(), PuppetError> {
        self.removed
            .borrow_mut()
            .push((name.to_string(), region.to_string()));
        if self.fail.get() {
            return Err(PuppetError::Apply {
                name: name.to_string(),
                source: command_failed("puppet apply"),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingSleeper {
    pub(crate) sleeps: RefCell<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration)
    }
}

/// One of each fake.
#[derive(Default)]
pub(crate) struct Fakes {
    pub(crate) machine: FakeMachine,
    pub(crate) cloud: FakeCloud,
    pub(crate) control_plane: FakeControlPlane,
    pub(crate) reaper: FakeReaper,
    pub(crate) sleeper: RecordingSleeper,
}

impl Fakes {
    pub(crate) fn toolkit(&self) -> Toolkit<'_> {
        Toolkit {
            machine: &self.machine,
            cloud: &self.cloud,
            control_plane: &self.control_plane,
            reaper: &self.reaper,
            sleeper: &self.sleeper,
        }
    }
}
