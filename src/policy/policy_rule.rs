//! Policy Rule Model
//! Core Principle: Every capability is denied unless explicitly granted

use serde::{Deserialize, Serialize};

/// A single capability an agent can grant on a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Read,
    Write,
    Download,
    Delete,
    Search,
    Execute,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Read,
        Capability::Write,
        Capability::Download,
        Capability::Delete,
        Capability::Search,
        Capability::Execute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Download => "download",
            Capability::Delete => "delete",
            Capability::Search => "search",
            Capability::Execute => "execute",
        }
    }
}

/// DLP access rule for one path on one agent.
///
/// Field names on the wire are `can_read`, `can_write`, ... which is what the
/// agents expect in a policy update. Missing fields deserialize as denied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyRule {
    pub can_read: bool,
    pub can_write: bool,
    pub can_download: bool,
    pub can_delete: bool,
    pub can_search: bool,
    pub can_execute: bool,
}

impl PolicyRule {
    /// Fully denied rule, the result for paths with no applicable rule
    pub fn deny_all() -> Self {
        PolicyRule::default()
    }

    pub fn allow_all() -> Self {
        PolicyRule {
            can_read: true,
            can_write: true,
            can_download: true,
            can_delete: true,
            can_search: true,
            can_execute: true,
        }
    }

    /// Read-only rule (read + search + download)
    pub fn read_only() -> Self {
        PolicyRule {
            can_read: true,
            can_download: true,
            can_search: true,
            ..PolicyRule::default()
        }
    }

    /// Builder-style grant
    pub fn with(mut self, capability: Capability) -> Self {
        *self.flag_mut(capability) = true;
        self
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Read => self.can_read,
            Capability::Write => self.can_write,
            Capability::Download => self.can_download,
            Capability::Delete => self.can_delete,
            Capability::Search => self.can_search,
            Capability::Execute => self.can_execute,
        }
    }

    fn flag_mut(&mut self, capability: Capability) -> &mut bool {
        match capability {
            Capability::Read => &mut self.can_read,
            Capability::Write => &mut self.can_write,
            Capability::Download => &mut self.can_download,
            Capability::Delete => &mut self.can_delete,
            Capability::Search => &mut self.can_search,
            Capability::Execute => &mut self.can_execute,
        }
    }

    pub fn is_deny_all(&self) -> bool {
        *self == PolicyRule::deny_all()
    }

    /// Short description for logs, e.g. `allow [read, search]`
    pub fn describe(&self) -> String {
        let allowed: Vec<&str> = Capability::ALL
            .iter()
            .filter(|c| self.allows(**c))
            .map(|c| c.as_str())
            .collect();

        if allowed.is_empty() {
            "deny all".to_string()
        } else {
            format!("allow [{}]", allowed.join(", "))
        }
    }
}
