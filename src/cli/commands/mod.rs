mod init;
mod prune;
mod serve;

pub use init::cmd_init;
pub use prune::cmd_prune;
pub use serve::cmd_serve;
