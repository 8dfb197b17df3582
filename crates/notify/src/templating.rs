//! Minijinja template rendering for alert messages.
//!
//! [`AlertContext`] is the flattened, display-ready view of a maintenance
//! event: every fallback ("No Title", "N/A", ...) is applied while building
//! it, so templates only interpolate.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call.

use fixwatch_core::{Directory, DisplayZone, MaintenanceEvent};

use crate::traits::NotifyError;

/// Subject line used for upcoming-event alerts.
pub const DEFAULT_SUBJECT_TEMPLATE: &str = "Upcoming Event";

/// Body used for upcoming-event alerts.
pub const DEFAULT_BODY_TEMPLATE: &str = "\
Title: {{ title }}
Task Description: {{ task_description }}
Start Date: {{ start }}
End Date: {{ end }}
Serial Number: {{ asset }}
Technicians: {{ technicians }}
Status: {{ status }}
Notes: {{ notes }}";

const NO_TITLE: &str = "No Title";
const NO_DESCRIPTION: &str = "No Description";
const NO_ASSET: &str = "N/A";
const NO_TECHNICIANS: &str = "No Technicians Assigned";
const NO_NOTES: &str = "No Notes";

/// Data available to alert templates.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AlertContext {
    pub event_id: String,
    pub title: String,
    /// Raw task labels, for templates that want to iterate.
    pub tasks: Vec<String>,
    /// Task labels joined by ", ", or the fallback.
    pub task_description: String,
    /// Start in the display timezone.
    pub start: String,
    /// End in the display timezone.
    pub end: String,
    /// Asset label (serial number when known).
    pub asset: String,
    /// Technician display names joined by ", ", or the fallback.
    pub technicians: String,
    pub status: String,
    pub notes: String,
    /// Name of the display timezone.
    pub timezone: String,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

impl AlertContext {
    pub fn from_event(event: &MaintenanceEvent, directory: &Directory, zone: DisplayZone) -> Self {
        let tasks: Vec<String> = event
            .task_descriptions
            .iter()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect();
        let task_description = if tasks.is_empty() {
            NO_DESCRIPTION.to_string()
        } else {
            tasks.join(", ")
        };

        let technicians = if event.technician_ids.is_empty() {
            NO_TECHNICIANS.to_string()
        } else {
            event
                .technician_ids
                .iter()
                .map(|id| directory.technician_name(id))
                .collect::<Vec<_>>()
                .join(", ")
        };

        Self {
            event_id: event.id.clone(),
            title: non_blank(event.title.as_deref()).unwrap_or(NO_TITLE).to_string(),
            tasks,
            task_description,
            start: zone.format(event.start()),
            end: zone.format(event.end()),
            asset: non_blank(event.asset_id.as_deref())
                .map(|id| directory.asset_label(id))
                .unwrap_or_else(|| NO_ASSET.to_string()),
            technicians,
            status: event.status().to_string(),
            notes: non_blank(event.notes.as_deref()).unwrap_or(NO_NOTES).to_string(),
            timezone: zone.name().to_string(),
        }
    }
}

/// Renders alert templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("bullets", bullets_filter);
        env.add_filter("upper", upper_filter);
        env
    }

    /// Render a template string against any serializable context.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render<S: serde::Serialize>(&self, template_str: &str, ctx: &S) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Validate that a template string parses without errors.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom filter: render a list as `- item` lines.
fn bullets_filter(items: Vec<String>) -> String {
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn upper_filter(value: String) -> String {
    value.to_uppercase()
}
