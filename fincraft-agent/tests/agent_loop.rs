mod common;

use common::ScriptedProvider;
use fincraft_agent::{Agent, AgentConfig, RecordingSink, RunEvent, RunOutcome};
use fincraft_error::ErrorKind;
use fincraft_llm::{ChatMessage, CompletionResponse, ProviderError, Role, ToolCall};
use fincraft_tools::{Tool, ToolRegistry, Toolbox};
use serde_json::{json, Value};
use tempfile::TempDir;

fn call(name: &str, arguments: Value) -> Result<CompletionResponse, ProviderError> {
    Ok(CompletionResponse::tool_calls(vec![ToolCall::new(
        "call_1",
        name,
        arguments.to_string(),
    )]))
}

fn raw_call(name: &str, arguments: &str) -> Result<CompletionResponse, ProviderError> {
    Ok(CompletionResponse::tool_calls(vec![ToolCall::new("call_1", name, arguments)]))
}

fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("aapl.json"), r#"{"ticker":"AAPL","eps":6.13}"#).unwrap();
    std::fs::write(dir.path().join("notes.md"), "# Notes\n").unwrap();
    dir
}

fn agent(
    dir: &TempDir,
    script: Vec<Result<CompletionResponse, ProviderError>>,
    config: AgentConfig,
) -> Agent<ScriptedProvider, RecordingSink> {
    agent_with(ToolRegistry::new(Toolbox::new(dir.path())), script, config)
}

fn agent_with(
    registry: ToolRegistry,
    script: Vec<Result<CompletionResponse, ProviderError>>,
    config: AgentConfig,
) -> Agent<ScriptedProvider, RecordingSink> {
    Agent::new(ScriptedProvider::new(script), registry, config, RecordingSink::new())
}

fn tool_message(run: &fincraft_agent::AgentRun, index: usize) -> Value {
    serde_json::from_str(run.memory.messages()[index].text_content()).unwrap()
}

#[tokio::test]
async fn immediate_terminate() {
    let dir = data_dir();
    let mut agent = agent(
        &dir,
        vec![call("terminate", json!({"message": "done"}))],
        AgentConfig::default(),
    );

    let run = agent.run("Summarize AAPL").await;

    assert!(matches!(&run.outcome, RunOutcome::Terminated { message } if message == "done"));
    assert_eq!(run.iterations, 1);
    assert_eq!(run.memory.len(), 1);
    assert_eq!(agent.provider().requests().len(), 1);
}

#[tokio::test]
async fn terminate_works_without_registering_it() {
    let dir = data_dir();
    let registry = ToolRegistry::with_tools(Toolbox::new(dir.path()), [Tool::ListFiles]);
    let mut agent = agent_with(
        registry,
        vec![
            call("terminate", json!({"message": "done"})),
            Ok(CompletionResponse::text("after")),
        ],
        AgentConfig::default(),
    );

    let run = agent.run("Summarize AAPL").await;

    assert!(matches!(&run.outcome, RunOutcome::Terminated { message } if message == "done"));
    assert_eq!(run.iterations, 1);
    assert_eq!(run.memory.len(), 1);
}

#[tokio::test]
async fn terminate_with_a_non_string_message_still_ends_the_run() {
    let dir = data_dir();
    let mut agent = agent(
        &dir,
        vec![
            call("terminate", json!({"message": 5})),
            Ok(CompletionResponse::text("after")),
        ],
        AgentConfig::default(),
    );

    let run = agent.run("Summarize AAPL").await;

    assert!(matches!(&run.outcome, RunOutcome::Terminated { message } if message.is_empty()));
    assert_eq!(run.memory.len(), 1);
    assert_eq!(agent.provider().requests().len(), 1);
    assert!(agent
        .sink()
        .events
        .iter()
        .all(|e| !matches!(e, RunEvent::ToolDispatched { .. })));
}

#[tokio::test]
async fn missing_file_error_goes_back_to_the_model() {
    let dir = data_dir();
    let mut agent = agent(
        &dir,
        vec![
            call("read_structured_file", json!({"file_name": "missing.json"})),
            Ok(CompletionResponse::text("That file does not exist.")),
        ],
        AgentConfig::default(),
    );

    let run = agent.run("Read missing.json").await;

    assert!(matches!(
        &run.outcome,
        RunOutcome::Completed { content } if content == "That file does not exist."
    ));
    assert_eq!(run.iterations, 2);
    assert_eq!(run.memory.len(), 3);

    assert_eq!(
        tool_message(&run, 1),
        json!({"tool_name": "read_structured_file", "args": {"file_name": "missing.json"}})
    );
    let result = tool_message(&run, 2);
    assert_eq!(
        result["error"],
        format!("file 'missing.json' not found in {}.", dir.path().display())
    );
    assert_eq!(run.memory.messages()[2].role, Role::User);

    // The second request saw the error
    let requests = agent.provider().requests();
    assert_eq!(requests[1].messages.len(), 3);
}

#[tokio::test]
async fn gateway_failure_on_third_iteration() {
    let dir = data_dir();
    let mut agent = agent(
        &dir,
        vec![
            call("list_files", json!({})),
            call("read_structured_file", json!({"file_name": "aapl.json"})),
            Err(ProviderError::Network("connection reset".into())),
        ],
        AgentConfig::default(),
    );

    let run = agent.run("Analyze AAPL").await;

    let RunOutcome::Failed { error } = &run.outcome else {
        panic!("expected failure, got {:?}", run.outcome);
    };
    assert_eq!(error.kind(), ErrorKind::NetworkFailed);
    assert_eq!(error.operation(), "agent::complete");
    assert!(error.context().iter().any(|(k, v)| *k == "iteration" && v == "3"));
    assert_eq!(run.iterations, 3);
    assert_eq!(run.memory.len(), 5);

    let events = &agent.sink().events;
    assert!(events
        .iter()
        .any(|e| matches!(e, RunEvent::GatewayFailed { iteration: 3, .. })));
}

#[tokio::test]
async fn empty_response_fails_the_run() {
    let dir = data_dir();
    let mut agent = agent(&dir, vec![Err(ProviderError::EmptyResponse)], AgentConfig::default());

    let run = agent.run("anything").await;

    let RunOutcome::Failed { error } = &run.outcome else {
        panic!("expected failure");
    };
    assert_eq!(error.kind(), ErrorKind::EmptyResponse);
    assert_eq!(run.memory.len(), 1);
}

#[tokio::test]
async fn budget_of_one_exhausts_after_a_tool_call() {
    let dir = data_dir();
    let mut agent = agent(
        &dir,
        vec![call("list_files", json!({}))],
        AgentConfig::default().with_max_iterations(1),
    );

    let run = agent.run("List the files").await;

    assert!(matches!(run.outcome, RunOutcome::Exhausted));
    assert_eq!(run.iterations, 1);
    assert_eq!(run.memory.len(), 3);
    assert_eq!(tool_message(&run, 2), json!({"result": ["aapl.json", "notes.md"]}));
}

#[tokio::test]
async fn never_more_calls_than_the_budget() {
    let dir = data_dir();
    let script = (0..10).map(|_| call("list_files", json!({}))).collect();
    let mut agent = agent(&dir, script, AgentConfig::default().with_max_iterations(4));

    let run = agent.run("Keep listing").await;

    assert!(matches!(run.outcome, RunOutcome::Exhausted));
    assert_eq!(agent.provider().requests().len(), 4);
    assert_eq!(run.memory.len(), 1 + 2 * 4);
}

#[tokio::test]
async fn unknown_tool_is_recoverable() {
    let dir = data_dir();
    let mut agent = agent(
        &dir,
        vec![
            call("delete_everything", json!({})),
            call("terminate", json!({"message": "ok"})),
        ],
        AgentConfig::default(),
    );

    let run = agent.run("Clean up").await;

    assert!(matches!(&run.outcome, RunOutcome::Terminated { message } if message == "ok"));
    assert_eq!(run.memory.len(), 3);
    assert_eq!(tool_message(&run, 2)["error"], "unknown tool: delete_everything");
}

#[tokio::test]
async fn only_the_first_tool_call_runs() {
    let dir = data_dir();
    let response = CompletionResponse::tool_calls(vec![
        ToolCall::new("a", "list_files", "{}"),
        ToolCall::new("b", "terminate", r#"{"message":"skipped"}"#),
    ]);
    let mut agent = agent(
        &dir,
        vec![Ok(response), Ok(CompletionResponse::text("Two files."))],
        AgentConfig::default(),
    );

    let run = agent.run("List the files").await;

    assert!(matches!(&run.outcome, RunOutcome::Completed { content } if content == "Two files."));
    assert_eq!(run.memory.len(), 3);
    assert_eq!(tool_message(&run, 1)["tool_name"], "list_files");
}

#[tokio::test]
async fn malformed_arguments_are_reported() {
    let dir = data_dir();
    let mut agent = agent(
        &dir,
        vec![
            raw_call("read_text_file", "{file_name: notes.md"),
            raw_call("list_files", ""),
            Ok(CompletionResponse::text("done")),
        ],
        AgentConfig::default(),
    );

    let run = agent.run("Read the notes").await;

    assert!(run.outcome.is_success());
    assert_eq!(run.memory.len(), 5);

    let request = tool_message(&run, 1);
    assert_eq!(request["args"], "{file_name: notes.md");
    let result = tool_message(&run, 2);
    assert_eq!(result["kind"], "InvalidArgument");
    assert_eq!(result["tool"], "read_text_file");

    // Empty argument text is an empty map
    assert_eq!(tool_message(&run, 3)["args"], json!({}));
    assert_eq!(tool_message(&run, 4)["result"], json!(["aapl.json", "notes.md"]));
}

#[tokio::test]
async fn missing_content_is_an_empty_answer() {
    let dir = data_dir();
    let mut agent = agent(&dir, vec![Ok(CompletionResponse::default())], AgentConfig::default());

    let run = agent.run("Say nothing").await;

    assert!(matches!(&run.outcome, RunOutcome::Completed { content } if content.is_empty()));
}

#[tokio::test]
async fn rules_are_prepended_every_call_and_never_stored() {
    let dir = data_dir();
    let rules = vec![
        ChatMessage::system("You are a financial analyst."),
        ChatMessage::system("Use the tools."),
    ];
    let mut agent = agent(
        &dir,
        vec![
            call("list_files", json!({})),
            Ok(CompletionResponse::text("done")),
        ],
        AgentConfig::default().with_rules(rules.clone()),
    );

    let run = agent.run("List the files").await;

    for request in agent.provider().requests() {
        assert_eq!(&request.messages[..2], &rules[..]);
        assert_eq!(request.messages[2], ChatMessage::user("List the files"));
        assert!(request.tools.as_ref().is_some_and(|tools| tools.len() == 4));
        assert_eq!(request.max_tokens, Some(1024));
    }
    assert!(run.memory.messages().iter().all(|m| m.role != Role::System));
}

#[tokio::test]
async fn sink_sees_the_whole_run() {
    let dir = data_dir();
    let mut agent = agent(
        &dir,
        vec![
            call("read_text_file", json!({"file_name": "notes.md"})),
            call("terminate", json!({"message": "bye"})),
        ],
        AgentConfig::default(),
    );

    agent.run("Read the notes").await;
    let sink = agent.into_sink();

    assert_eq!(sink.inits, 1);
    assert_eq!(sink.flushes, 1);
    assert!(matches!(sink.events.first(), Some(RunEvent::Started { max_iterations: 10, .. })));
    assert!(sink.events.iter().any(|e| matches!(
        e,
        RunEvent::ToolDispatched { iteration: 1, tool, is_error: false, .. }
            if tool == "read_text_file"
    )));
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, RunEvent::Terminated { iteration: 2, message } if message == "bye")));
    assert_eq!(
        sink.events.last(),
        Some(&RunEvent::Finished {
            outcome: "terminated",
            iterations: 2
        })
    );
}
