//! The three per-target workflows: install, local run, deployment.

pub mod deploy;
pub mod install;
pub mod local;
pub mod log;

pub use deploy::{deploy_command, deploy_target, test_deploy, Deployment};
pub use install::{install_command, install_dependencies};
pub use local::test_local_app;
pub use log::{DeploymentLog, LogState, LogWatch};
