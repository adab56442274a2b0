use fincraft_agent::{AgentConfig, AgentFile, Settings};
use fincraft_tools::{ToolRegistry, Toolbox};
use std::path::Path;

fn repo_file(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("config").join(name)
}

#[test]
fn shipped_agent_file_matches_the_registry() {
    let file = AgentFile::load(repo_file("agent.json")).unwrap();
    let registry = ToolRegistry::new(Toolbox::new("data"));

    let shipped: Vec<String> = file.tool_definitions().into_iter().map(|d| d.name).collect();
    let builtin: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
    assert_eq!(shipped, builtin);
    assert!(!file.agent_rules.is_empty());
}

#[test]
fn shipped_settings_are_valid() {
    let settings = Settings::load(repo_file("fincraft.toml")).unwrap();
    let file = AgentFile::load(repo_file("agent.json")).unwrap();

    let config = AgentConfig::from_files(&file, &settings, "gpt-4o");
    assert!(config.validate().is_ok());
    assert_eq!(settings.general.model, "openai/gpt-4o");
    assert_eq!(settings.general.temperature, Some(0.0));
}
