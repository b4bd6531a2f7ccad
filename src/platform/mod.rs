//! Concrete transport implementations
//!
//! Everything here talks to real remote hosts. The rest of the crate only
//! sees these through the [`Transport`](crate::core::Transport) trait.

pub mod ssh;
pub mod winrm;

pub use ssh::SshTransport;
pub use winrm::WinRmTransport;
