//! Sandboxed template interpolation.
//!
//! Templates are user-authored configuration (workflow action bodies,
//! runbook payloads), so the engine is deliberately closed: `{{path}}`
//! substitution plus a fixed helper whitelist, no expression grammar, no
//! dynamic helper registration, no file inclusion. Safety across tenants
//! beats expressiveness here.
//!
//! ```
//! use vigil_template::{RenderContext, Template};
//!
//! let tpl = Template::parse("P1: {{uppercase incident.priority}}").unwrap();
//! let ctx = RenderContext::new(serde_json::json!({"priority": "critical"}));
//! assert_eq!(tpl.render(&ctx).unwrap(), "P1: CRITICAL");
//! ```

mod context;
mod error;
mod helpers;
mod parser;
mod template;

pub use context::{RenderContext, lookup_path, value_to_display};
pub use error::TemplateError;
pub use helpers::Helper;
pub use parser::Position;
pub use template::{Template, validate};
