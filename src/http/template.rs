//! HTML template rendering
//!
//! Templates are embedded in the binary and rendered with minijinja, with
//! HTML auto-escaping on.

use crate::{Result, SsoError};
use minijinja::Environment;
use std::sync::Arc;

/// Auth server login form
pub const LOGIN: &str = "login";
/// Auth server registration form
pub const REGISTRATION: &str = "registration";
/// UI service login form
pub const UI_LOGIN: &str = "ui_login";
/// UI service identity page
pub const UI_IDENTITY: &str = "ui_identity";

/// Template renderer for HTML pages using minijinja
#[derive(Clone)]
pub struct TemplateRenderer {
    env: Arc<Environment<'static>>,
}

impl TemplateRenderer {
    /// Create a renderer with every embedded template loaded
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::Html);

        env.add_template(LOGIN, include_str!("../../static/login.html"))?;
        env.add_template(REGISTRATION, include_str!("../../static/registration.html"))?;
        env.add_template(UI_LOGIN, include_str!("../../static/ui/login.html"))?;
        env.add_template(UI_IDENTITY, include_str!("../../static/ui/identity.html"))?;

        Ok(Self { env: Arc::new(env) })
    }

    /// Render a template with JSON data
    pub fn render_json(&self, name: &str, data: &serde_json::Value) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|_| SsoError::config(format!("Template '{}' not found", name)))?;
        Ok(template.render(data)?)
    }
}
