pub mod account;
pub mod init;
pub mod link;
pub mod serve;
pub mod share;
pub mod version;

pub use account::Account;
pub use init::Init;
pub use link::Link;
pub use serve::Serve;
pub use share::Share;
pub use version::Version;
