//! Fully qualified metric names.
//!
//! Every instrument created through the facade is named
//! `<root>.<scope>[.<id>].<name>`, e.g. `backstage.plugin.catalog.entities.total`.

use std::fmt;

/// Which part of the system owns a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricScope {
    Framework,
    Plugin,
    Service,
}

impl MetricScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Framework => "framework",
            Self::Plugin => "plugin",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for MetricScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps bare metric names onto fully qualified dotted names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricNamePrefixer {
    prefix: String,
}

impl MetricNamePrefixer {
    /// Build a prefixer for `root`, `scope` and an optional component id.
    ///
    /// Empty segments are skipped so the result never contains `..`.
    pub fn new(root_namespace: &str, scope: MetricScope, id: Option<&str>) -> Self {
        let segments = [Some(root_namespace), Some(scope.as_str()), id];
        let prefix = segments
            .into_iter()
            .flatten()
            .map(|s| s.trim_matches('.'))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(".");
        Self { prefix }
    }

    /// The namespace shared by every name this prefixer produces.
    pub fn namespace(&self) -> &str {
        &self.prefix
    }

    pub fn prefix(&self, name: &str) -> String {
        let name = name.trim_matches('.');
        if name.is_empty() {
            return self.prefix.clone();
        }
        format!("{}.{}", self.prefix, name)
    }
}
