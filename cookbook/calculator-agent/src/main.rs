use std::sync::Arc;

use sayr_loop::{
    init_tracing, Agent, AppConfig, CalculatorTool, ConsoleNarrator, Result, ScriptedModel,
    ToolRegistry,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging)?;

    let mut tools = ToolRegistry::new();
    tools.register(CalculatorTool);

    let mut agent = Agent::new(Arc::new(ScriptedModel::new()))
        .with_tools(tools)
        .with_settings(&config.agent);
    if config.agent.narrate {
        agent = agent.with_hook(Arc::new(ConsoleNarrator));
    }

    agent.run("Hello, who are you?").await;
    agent.run("Please calculate 25 * 4 for me.").await;

    Ok(())
}
