pub mod command;
pub mod event;
pub mod identity;
pub mod lifecycle;

pub use command::CommandDescriptor;
pub use event::{ChangeEvent, ChangeEventKind};
pub use identity::ProcessIdentity;
pub use lifecycle::{Lifecycle, LifecycleState};
