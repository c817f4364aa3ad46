use serde::Serialize;
use std::collections::BTreeMap;

/// Per-tool tallies. Monotonic for the lifetime of the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ToolStats {
    pub count: u64,
    pub success: u64,
    pub failure: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    tools: BTreeMap<String, ToolStats>,
}

impl UsageStats {
    pub fn record_success(&mut self, tool: &str) {
        let stats = self.tools.entry(tool.to_string()).or_default();
        stats.count += 1;
        stats.success += 1;
    }

    pub fn record_failure(&mut self, tool: &str) {
        let stats = self.tools.entry(tool.to_string()).or_default();
        stats.count += 1;
        stats.failure += 1;
    }

    pub fn get(&self, tool: &str) -> Option<ToolStats> {
        self.tools.get(tool).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ToolStats)> {
        self.tools.iter().map(|(name, stats)| (name.as_str(), stats))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn totals(&self) -> ToolStats {
        self.tools
            .values()
            .fold(ToolStats::default(), |acc, stats| ToolStats {
                count: acc.count + stats.count,
                success: acc.success + stats.success,
                failure: acc.failure + stats.failure,
            })
    }
}
