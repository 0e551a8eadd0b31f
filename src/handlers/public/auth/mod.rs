pub mod login;
pub mod refresh;
pub mod utils;

pub use login::login;
pub use refresh::refresh;
