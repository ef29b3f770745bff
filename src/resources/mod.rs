//! Built-in resource implementations.
//!
//! Each module implements the engine's task contract for one resource
//! kind. The engine itself only ever sees `Preparer` and `Task` trait
//! objects through the registry.

pub mod file_content;
pub mod shell;
pub mod user;
pub mod wait;

use resource::Registry;

/// The registry with every built-in kind. Called once at process start.
pub fn registry() -> Registry {
    let mut registry = Registry::with_builtins();
    registry.register::<file_content::Preparer>("file.content");
    registry.register::<shell::Preparer>("task");
    registry.register::<shell::QueryPreparer>("task.query");
    registry.register::<user::Preparer>("user");
    registry.register::<wait::Preparer>("wait");
    registry
}
