use agent_utils::process::{run_checked, CommandRunner, Invocation, ProcessRunner};
use log::{debug, info};
use rancher_types::NodeIdentity;
use snafu::{ResultExt, Snafu};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_WORK_DIR: &str = "/tmp/puppet";

const PUPPETFILE: &str = "forge 'https://forgeapi.puppetlabs.com'

mod 'puppetlabs-aws'
";

/// `puppet apply --detailed-exitcodes` exits 2 when it changed something.
const APPLY_SUCCESS_CODES: [i32; 2] = [0, 2];

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PuppetError {
    #[snafu(display("Unable to prepare '{}': {}", path.display(), source))]
    WorkDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to write '{}': {}", path.display(), source))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to install puppet modules: {}", source))]
    InstallModules { source: agent_utils::Error },

    #[snafu(display("Failed to remove '{}' with puppet: {}", name, source))]
    Apply {
        name: String,
        source: agent_utils::Error,
    },
}

/// Removes cloud instances directly, without going through the node provisioning tool.
pub trait InfrastructureReaper {
    /// Make sure no instance named `name` exists in `region`.
    fn ensure_absent(&self, name: &NodeIdentity, region: &str) -> Result<(), PuppetError>;
}

/// Removes instances by applying an `ec2_instance { ensure => absent }` manifest.
pub struct PuppetReaper<R = ProcessRunner> {
    runner: R,
    work_dir: PathBuf,
}

impl PuppetReaper {
    pub fn new() -> Self {
        Self::with_runner(ProcessRunner, DEFAULT_WORK_DIR)
    }
}

impl Default for PuppetReaper {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> PuppetReaper<R> {
    pub fn with_runner<P: Into<PathBuf>>(runner: R, work_dir: P) -> Self {
        Self {
            runner,
            work_dir: work_dir.into(),
        }
    }

    fn modules_dir(&self) -> PathBuf {
        self.work_dir.join("modules")
    }

    fn manifest_path(&self) -> PathBuf {
        self.work_dir.join("manifest.pp")
    }

    /// Start from an empty work directory holding only the `Puppetfile`.
    fn reset_work_dir(&self) -> Result<(), PuppetError> {
        if self.work_dir.exists() {
            fs::remove_dir_all(&self.work_dir).context(WorkDirSnafu {
                path: &self.work_dir,
            })?;
        }
        fs::create_dir_all(self.modules_dir()).context(WorkDirSnafu {
            path: &self.work_dir,
        })?;
        write(&self.work_dir.join("Puppetfile"), PUPPETFILE)
    }

    fn install_modules(&self) -> Result<(), PuppetError> {
        let invocation = Invocation::new("librarian-puppet")
            .args(["install", "--no-verbose", "--clean", "--path"])
            .arg(self.modules_dir().display().to_string())
            .current_dir(&self.work_dir);
        run_checked(&self.runner, &invocation, &[0]).context(InstallModulesSnafu)?;
        Ok(())
    }
}

impl<R: CommandRunner> InfrastructureReaper for PuppetReaper<R> {
    fn ensure_absent(&self, name: &NodeIdentity, region: &str) -> Result<(), PuppetError> {
        info!("Removing '{}' from '{}' via Puppet...", name, region);
        self.reset_work_dir()?;
        self.install_modules()?;

        let manifest = absent_manifest(name, region);
        debug!("Applying manifest:\n{}", manifest);
        write(&self.manifest_path(), &manifest)?;

        let invocation = Invocation::new("puppet")
            .args(["apply", "--detailed-exitcodes"])
            .arg(format!("--modulepath={}", self.modules_dir().display()))
            .arg("--verbose")
            .arg(self.manifest_path().display().to_string());
        run_checked(&self.runner, &invocation, &APPLY_SUCCESS_CODES)
            .context(ApplySnafu { name: name.as_str() })?;
        Ok(())
    }
}

fn absent_manifest(name: &NodeIdentity, region: &str) -> String {
    format!(
        "ec2_instance {{ '{}':\n  region => '{}',\n  ensure => absent,\n}}\n",
        name, region
    )
}

fn write(path: &Path, contents: &str) -> Result<(), PuppetError> {
    fs::write(path, contents).context(WriteFileSnafu { path })
}
