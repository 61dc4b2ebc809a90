mod cancel;
mod completion;
mod drops;
mod errors;
mod event;
mod hooks;
mod mode;
mod registry;
mod semwait;
mod waitgroup;

pub use cancel::*;
pub use completion::*;
pub use drops::*;
pub use errors::*;
pub use event::*;
pub use hooks::HookId;
pub use mode::*;
pub use semwait::*;
pub use waitgroup::*;
