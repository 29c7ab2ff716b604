/// The port the control plane publishes its API on.
pub const CONTROL_PLANE_PORT: u16 = 8080;
/// The project that registration tokens are created in.
pub const DEFAULT_PROJECT_ID: &str = "1a5";
/// The machine driver whose schema is used to detect that the control plane API is up.
pub const READINESS_PROVIDER: &str = "amazonec2";
/// The container image used for agents when the control plane does not report one.
pub const DEFAULT_AGENT_IMAGE: &str = "rancher/agent";
pub const DEFAULT_AGENT_COUNT: u32 = 3;

/// Holds the control plane URL after the server is provisioned.
pub const SERVER_URL_FILE: &str = "cattle_test_url";
/// Holds the agent [`Registration`](crate::Registration) after the server is configured.
pub const REGISTRATION_FILE: &str = "cattle_agent_registration.json";

/// Public keys that are appended to `authorized_keys` on every node.
pub const SSH_KEY_URLS: [&str; 2] = [
    "https://raw.githubusercontent.com/rancherlabs/ssh-pub-keys/master/ssh-pub-keys/ci",
    "https://raw.githubusercontent.com/rancherlabs/ssh-pub-keys/master/ssh-pub-keys/osmatrix",
];
