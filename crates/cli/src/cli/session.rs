//! Commands that go through a pooled session: `probe`, `tools`, `call`.
//!
//! Each command builds a manager from config, runs, then closes every
//! session it opened whatever the outcome.

use std::time::Duration;

use anyhow::Context;
use serde_json::Value;

use mp_domain::config::Config;
use mp_mcp_client::{CallContext, McpManager};

use super::Target;

fn context(target: &Target) -> CallContext {
    CallContext::with_timeout_from_now(Duration::from_secs(target.timeout_secs))
}

pub async fn probe(config: &Config, target: Target) -> anyhow::Result<()> {
    let manager = McpManager::from_config(&config.mcp);
    let result = run_probe(&manager, &target).await;
    manager.shutdown().await;
    result
}

pub async fn tools(config: &Config, target: Target) -> anyhow::Result<()> {
    let manager = McpManager::from_config(&config.mcp);
    let result = run_tools(&manager, &target).await;
    manager.shutdown().await;
    result
}

pub async fn call(config: &Config, target: Target, tool: String, args: String, json: bool) -> anyhow::Result<()> {
    let arguments: Value = serde_json::from_str(&args).context("--args must be valid JSON")?;
    anyhow::ensure!(arguments.is_object(), "--args must be a JSON object");

    let manager = McpManager::from_config(&config.mcp);
    let result = run_call(&manager, &target, &tool, arguments, json).await;
    manager.shutdown().await;
    result
}

async fn run_probe(manager: &McpManager, target: &Target) -> anyhow::Result<()> {
    let ctx = context(target);
    let headers = target.header_map();
    let session = manager
        .session(&ctx, &target.server, &headers)
        .await
        .with_context(|| format!("connecting to '{}'", target.server))?;
    session
        .ping(&ctx)
        .await
        .with_context(|| format!("pinging '{}'", target.server))?;

    let init = session.initialize_result();
    println!("server:   {} {}", init.server_info.name, init.server_info.version);
    println!("protocol: {}", init.protocol_version);
    println!("session:  {}", manager.pool(&target.server)?.session_key(&headers));
    if let Some(instructions) = &init.instructions {
        println!("\n{instructions}");
    }
    Ok(())
}

async fn run_tools(manager: &McpManager, target: &Target) -> anyhow::Result<()> {
    let ctx = context(target);
    let tools = manager
        .list_tools(&ctx, &target.server, &target.header_map())
        .await
        .with_context(|| format!("listing tools on '{}'", target.server))?;

    if tools.is_empty() {
        println!("(no tools)");
    }
    for tool in tools {
        if tool.description.is_empty() {
            println!("{}", tool.name);
        } else {
            println!("{:<24} {}", tool.name, tool.description);
        }
    }
    Ok(())
}

async fn run_call(manager: &McpManager, target: &Target, tool: &str, arguments: Value, json: bool) -> anyhow::Result<()> {
    let ctx = context(target);
    let result = manager
        .call_tool(&ctx, &target.server, &target.header_map(), tool, arguments)
        .await
        .with_context(|| format!("calling '{tool}' on '{}'", target.server))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for item in &result.content {
            println!("{}", item.text);
        }
    }
    anyhow::ensure!(!result.is_error, "tool '{tool}' reported an error");
    Ok(())
}
