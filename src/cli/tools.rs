//! `mcp-tester tools` and `mcp-tester call`.

use std::error::Error;
use std::time::Duration;

use serde_json::Value;

use crate::mcp::catalog::{coerce_arguments, validate_arguments, Tool};
use crate::mcp::correlator::is_logical_failure;
use crate::mcp::engine::{CallOptions, EngineHandle, EngineSnapshot};
use crate::mcp::stats::ToolStats;

/// Waits for the first catalog to land. The engine keeps reconnecting on its
/// own, so the only way out without a catalog is the deadline.
pub async fn wait_for_catalog(
    handle: &EngineHandle,
    limit: Duration,
) -> Result<EngineSnapshot, String> {
    let ready = handle.wait_until(|snapshot| snapshot.catalog_generation > 0);
    match tokio::time::timeout(limit, ready).await {
        Ok(Some(snapshot)) => Ok(snapshot),
        Ok(None) => Err("Engine stopped before the tool list arrived".to_string()),
        Err(_) => {
            let snapshot = handle.snapshot();
            let mut message = format!(
                "Timed out after {}s waiting for the tool list (status: {})",
                limit.as_secs(),
                snapshot.status.status_text
            );
            if let Some(entry) = snapshot.logs.first() {
                message.push_str(&format!("\n   Last log: {entry}"));
            }
            Err(message)
        }
    }
}

/// Renders one catalog entry; required parameters are starred.
pub fn format_tool(tool: &Tool) -> String {
    let mut out = match tool.description.as_deref().map(str::trim) {
        Some(description) if !description.is_empty() => {
            format!("🔧 {}: {description}", tool.name)
        }
        _ => format!("🔧 {}", tool.name),
    };

    for (name, prop) in &tool.input_schema.properties {
        let marker = if tool.is_required(name) { "*" } else { " " };
        let kind = prop.primary_type().unwrap_or("any");
        out.push_str(&format!("\n   {marker} {name} ({kind})"));
        if let Some(description) = prop.description.as_deref() {
            out.push_str(&format!(": {description}"));
        }
    }
    out
}

/// Splits `KEY=VALUE` words. The value keeps any further `=`.
pub fn parse_key_values(raw: &[String]) -> Result<Vec<(String, String)>, String> {
    raw.iter()
        .map(|word| match word.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(format!("Expected KEY=VALUE, got '{word}'")),
        })
        .collect()
}

pub fn format_stats(tool: &str, stats: ToolStats) -> String {
    format!(
        "📊 {tool}: {} calls, {} succeeded, {} failed",
        stats.count, stats.success, stats.failure
    )
}

pub async fn run_tools(handle: EngineHandle, wait: Duration) -> Result<(), Box<dyn Error>> {
    let outcome = wait_for_catalog(&handle, wait).await;
    handle.shutdown();
    let snapshot = outcome?;

    if snapshot.tools.is_empty() {
        println!("No tools advertised by the server.");
        return Ok(());
    }
    println!("Available tools ({}):", snapshot.tools.len());
    for tool in snapshot.tools.iter() {
        println!("{}", format_tool(tool));
    }
    Ok(())
}

pub async fn run_call(
    handle: EngineHandle,
    tool_name: &str,
    raw_arguments: &[String],
    wait: Duration,
) -> Result<(), Box<dyn Error>> {
    let outcome = call(&handle, tool_name, raw_arguments, wait).await;
    handle.shutdown();
    outcome
}

async fn call(
    handle: &EngineHandle,
    tool_name: &str,
    raw_arguments: &[String],
    wait: Duration,
) -> Result<(), Box<dyn Error>> {
    let pairs = parse_key_values(raw_arguments)?;
    let snapshot = wait_for_catalog(handle, wait).await?;
    let tool = snapshot.find_tool(tool_name).ok_or_else(|| {
        let names: Vec<&str> = snapshot.tools.iter().map(|t| t.name.as_str()).collect();
        format!(
            "Unknown tool '{tool_name}'. Available: {}",
            if names.is_empty() {
                "none".to_string()
            } else {
                names.join(", ")
            }
        )
    })?;

    let arguments = Value::Object(coerce_arguments(tool, &pairs)?);
    if let Err(violations) = validate_arguments(tool, &arguments) {
        return Err(format!(
            "Arguments rejected by the '{tool_name}' schema:\n   {}",
            violations.join("\n   ")
        )
        .into());
    }

    let before = snapshot.stats.get(tool_name).unwrap_or_default().count;
    let result = handle
        .call_tool(tool_name, arguments, CallOptions::default())
        .await?;

    let label = if is_logical_failure(&result) {
        "⚠️  Tool reported a failure"
    } else {
        "✅ Success"
    };
    println!("{label}");
    println!("{}", serde_json::to_string_pretty(&result)?);

    let counted = handle.wait_until(|snapshot| {
        snapshot
            .stats
            .get(tool_name)
            .is_some_and(|stats| stats.count > before)
    });
    let stats = tokio::time::timeout(Duration::from_secs(1), counted)
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| handle.snapshot())
        .stats
        .get(tool_name)
        .unwrap_or_default();
    println!("{}", format_stats(tool_name, stats));
    Ok(())
}
