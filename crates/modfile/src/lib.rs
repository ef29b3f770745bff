//! # Modfile
//!
//! Lexer and parser for the batuque module language: nested named blocks
//! of typed key/value fields.
//!
//! ```text
//! param "lang" { default = "" }
//!
//! task "install-jq" {
//!   check   = "dpkg -s jq >/dev/null 2>&1"
//!   apply   = "apt-get install -y jq"
//!   depends = ["install-build-essential"]
//!   group   = "apt"
//! }
//!
//! switch "language" {
//!   case "eq(param('lang'), 'spanish')" "spanish" {
//!     file.content "greeting" { destination = "/tmp/greeting", content = "hola" }
//!   }
//!   default {
//!     file.content "greeting" { destination = "/tmp/greeting", content = "hi" }
//!   }
//! }
//! ```
//!
//! Values are scalars, lists, and maps. Template expressions (`{{ … }}`)
//! stay opaque inside string literals; the engine renders them later.

pub mod error;
mod lexer;
pub mod node;
pub mod parser;
pub mod value;

pub use error::{Error, Result};
pub use node::Node;
pub use parser::parse;
pub use value::Value;
