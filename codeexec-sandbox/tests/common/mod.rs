//! Shared helpers for pipeline tests

use codeexec_sandbox::{
    LanguageRegistry, MockEngine, MockProgram, ProgramBehavior, ResourceLimits, SandboxService,
};
use std::sync::Arc;

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Tiny stand-in for a python interpreter: `print("...")` lines produce
/// output, `raise` fails with a traceback, `while True` never exits.
pub fn fake_python(program: &MockProgram) -> ProgramBehavior {
    let source = program.source().unwrap_or_default();

    if source.contains("while True") {
        return ProgramBehavior::Hang;
    }

    let mut output = String::new();
    for line in source.lines() {
        let line = line.trim();
        if let Some(text) = line
            .strip_prefix("print(\"")
            .and_then(|rest| rest.strip_suffix("\")"))
        {
            output.push_str(text);
            output.push('\n');
        } else if let Some(exc) = line.strip_prefix("raise ") {
            output.push_str("Traceback (most recent call last):\n");
            output.push_str("  File \"/app/main.py\", line 1, in <module>\n");
            output.push_str(exc);
            output.push('\n');
            return ProgramBehavior::exit(1, output);
        }
    }
    ProgramBehavior::exit(0, output)
}

pub fn service_with(engine: Arc<MockEngine>) -> SandboxService {
    SandboxService::with_config(engine, LanguageRegistry::builtin(), ResourceLimits::default())
}
