mod machine;
mod transitions;
mod types;

#[cfg(test)]
mod tests;

pub use machine::Lifecycle;
pub use types::LifecycleState;
