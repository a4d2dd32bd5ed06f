//! Known-fix catalogue.
//!
//! Templates are keyed on the exact issue category; the error substring is
//! only compared within that category, so `network.dns` never matches a
//! template for `network.dns.cache`.

use std::collections::HashMap;

use shared_types::{DetectedIssue, FixKind};

use super::entities::FixTemplate;

#[derive(Debug, Clone, Default)]
pub struct TemplateCatalogue {
    by_category: HashMap<String, Vec<FixTemplate>>,
}

impl TemplateCatalogue {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Templates for common network faults.
    pub fn standard() -> Self {
        let mut catalogue = Self::empty();
        let entries: [(&str, &str, FixKind, &str, &str, u8); 7] = [
            (
                "network.dns",
                "servfail",
                FixKind::ConfigChange,
                "Switch to fallback resolvers",
                r#"{"dns":{"fallback_servers":["1.1.1.1","9.9.9.9"]}}"#,
                80,
            ),
            (
                "network.dns",
                "timed out",
                FixKind::ConfigChange,
                "Raise resolver timeout and retries",
                r#"{"dns":{"timeout_ms":5000,"attempts":3}}"#,
                70,
            ),
            (
                "network.dhcp",
                "no lease",
                FixKind::MethodFallback,
                "Fall back to static addressing",
                "static-ip",
                65,
            ),
            (
                "network.wifi",
                "channel busy",
                FixKind::ConfigChange,
                "Let the radio pick its channel",
                r#"{"wifi":{"channel":"auto"}}"#,
                75,
            ),
            (
                "network.hotspot",
                "not supported",
                FixKind::MethodFallback,
                "Use the hostapd hotspot backend",
                "hostapd",
                60,
            ),
            (
                "network.interface",
                "driver",
                FixKind::DriverUpdate,
                "Wireless driver needs updating",
                "wireless driver reported a fault; install the vendor driver update",
                55,
            ),
            (
                "portal.http",
                "address already in use",
                FixKind::CommandExecution,
                "Restart the captive portal service",
                "systemctl restart meshmend-portal",
                85,
            ),
        ];
        for (category, substring, kind, description, payload, confidence) in entries {
            catalogue.add(FixTemplate {
                category: category.into(),
                error_substring: substring.into(),
                kind,
                description: description.into(),
                payload: payload.into(),
                confidence,
            });
        }
        catalogue
    }

    pub fn add(&mut self, template: FixTemplate) {
        self.by_category
            .entry(template.category.clone())
            .or_default()
            .push(template);
    }

    /// First template for the issue's category whose substring occurs in
    /// its error message.
    pub fn find(&self, issue: &DetectedIssue) -> Option<&FixTemplate> {
        let message = issue.error_message().to_lowercase();
        self.by_category.get(&issue.category)?.iter().find(|template| {
            message.contains(&template.error_substring.to_lowercase())
        })
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
