//! Concrete request handlers wired into the router at startup.

pub mod echo;
pub mod files;
pub mod root;
pub mod user_agent;

pub use echo::EchoHandler;
pub use files::FileHandler;
pub use root::RootHandler;
pub use user_agent::UserAgentHandler;
