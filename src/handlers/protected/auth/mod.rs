pub mod logout;
pub mod whoami;

pub use logout::logout;
pub use whoami::whoami;
