//! One module per subcommand, each exposing `execute`.

pub mod delete;
pub mod get;
pub mod init;
pub mod list;
pub mod passwd;
pub mod set;
pub mod sync;
