//! One file per subcommand. Each handler owns its argument handling and
//! error reporting and returns the process exit code.

mod archive;
mod client;
mod relay;
mod stream;

pub use archive::cmd_archive;
pub use client::cmd_client;
pub use relay::cmd_relay;
pub use stream::cmd_stream;
