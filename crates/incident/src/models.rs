//! Statuspage API and webhook payloads.
//!
//! Only the fields the monitor reads are modelled; unknown fields are ignored.
use serde::Deserialize;

/// One entry in an incident's update log. The newest update comes first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IncidentUpdate {
    /// Update ID
    pub id: String,
    /// Free-form update text
    #[serde(default)]
    pub body: Option<String>,
    /// Incident status at the time of the update
    pub status: String,
}

/// Component reference attached to an incident or maintenance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AffectedComponent {
    /// Component ID
    pub id: String,
    /// Component name
    pub name: String,
}

/// A component and its current status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Component {
    /// Component ID
    pub id: String,
    /// Component name
    pub name: String,
    /// Status (e.g. operational, degraded_performance)
    pub status: String,
}

/// An incident as returned by the API or pushed by webhook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Incident {
    /// Incident ID
    pub id: String,
    /// Incident title
    pub name: String,
    /// Lifecycle status (e.g. investigating)
    pub status: String,
    /// Impact level (e.g. major)
    #[serde(default)]
    pub impact: Option<String>,
    /// Updates, newest first
    #[serde(default)]
    pub incident_updates: Vec<IncidentUpdate>,
    /// Affected components
    #[serde(default)]
    pub components: Vec<AffectedComponent>,
}

impl Incident {
    /// Most recent update, if any.
    pub fn latest_update(&self) -> Option<&IncidentUpdate> {
        self.incident_updates.first()
    }

    /// Comma-separated names of affected components, `Unknown` when none.
    pub fn affected(&self) -> String {
        join_names(&self.components)
    }
}

/// A scheduled maintenance window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduledMaintenance {
    /// Maintenance ID
    pub id: String,
    /// Maintenance title
    pub name: String,
    /// Lifecycle status (e.g. scheduled, in_progress)
    pub status: String,
    /// Impact level
    #[serde(default)]
    pub impact: Option<String>,
    /// Window start
    #[serde(default)]
    pub scheduled_for: Option<String>,
    /// Window end
    #[serde(default)]
    pub scheduled_until: Option<String>,
    /// Updates, newest first
    #[serde(default)]
    pub incident_updates: Vec<IncidentUpdate>,
    /// Affected components
    #[serde(default)]
    pub components: Vec<AffectedComponent>,
}

impl ScheduledMaintenance {
    /// Most recent update, if any.
    pub fn latest_update(&self) -> Option<&IncidentUpdate> {
        self.incident_updates.first()
    }

    /// Comma-separated names of affected components, `Unknown` when none.
    pub fn affected(&self) -> String {
        join_names(&self.components)
    }
}

fn join_names(components: &[AffectedComponent]) -> String {
    if components.is_empty() {
        return "Unknown".to_owned();
    }
    components.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
}

/// A component status change pushed by webhook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComponentUpdate {
    /// Update ID
    pub id: String,
    /// Component the update belongs to
    pub component_id: String,
    /// Status before the change
    pub old_status: String,
    /// Status after the change
    pub new_status: String,
}

/// Page the webhook was sent from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageInfo {
    /// Statuspage page ID
    pub id: String,
    /// Overall indicator (none, minor, major, critical)
    #[serde(default)]
    pub status_indicator: Option<String>,
    /// Human readable overall status
    #[serde(default)]
    pub status_description: Option<String>,
}

/// Webhook body for incident notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct IncidentWebhook {
    /// Source page
    pub page: PageInfo,
    /// The incident
    pub incident: Incident,
}

/// Webhook body for component notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentWebhook {
    /// Source page
    pub page: PageInfo,
    /// The status change
    pub component_update: ComponentUpdate,
    /// The component after the change
    pub component: Component,
}

/// Webhook body for scheduled maintenance notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceWebhook {
    /// Source page
    pub page: PageInfo,
    /// The maintenance
    pub scheduled_maintenance: ScheduledMaintenance,
}

/// `GET /incidents/unresolved.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentsResponse {
    /// Unresolved incidents
    #[serde(default)]
    pub incidents: Vec<Incident>,
}

/// `GET /components.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComponentsResponse {
    /// All components of the page
    #[serde(default)]
    pub components: Vec<Component>,
}

/// Overall page status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageStatus {
    /// none, minor, major or critical
    pub indicator: String,
    /// Human readable status
    pub description: String,
}

impl Default for PageStatus {
    fn default() -> Self {
        Self { indicator: "unknown".to_owned(), description: "Unknown".to_owned() }
    }
}

/// `GET /summary.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Summary {
    /// Overall page status
    #[serde(default)]
    pub status: PageStatus,
    /// All components of the page
    #[serde(default)]
    pub components: Vec<Component>,
}

impl Summary {
    /// Components whose status is not `operational`.
    pub fn degraded_components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(|c| c.status != "operational")
    }
}
