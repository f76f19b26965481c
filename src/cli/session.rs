//! Interactive question loop.
//!
//! Generic over its input and output so it can be driven from tests.
use std::io::{BufRead, Write};

use anyhow::Result;
use tracing::warn;

use super::commands::Command;
use super::output::{HELP, filter_report, info_report, truncate_str};
use crate::config::Config;
use crate::rag::{RagPipeline, USER_INPUT_SOURCE};

const PREVIEW_CHARS: usize = 200;

enum Flow {
    Continue,
    Exit,
}

pub struct Session<'a, R, W> {
    rag: &'a mut RagPipeline,
    input: R,
    out: W,
    config_path: String,
}

impl<'a, R: BufRead, W: Write> Session<'a, R, W> {
    pub fn new(rag: &'a mut RagPipeline, input: R, out: W, config_path: &str) -> Self {
        Self {
            rag,
            input,
            out,
            config_path: config_path.to_string(),
        }
    }

    /// Run until `/bye` or end of input.
    pub fn run(&mut self) -> Result<()> {
        writeln!(self.out, "ragloop: ask a question, or type /help for commands.")?;

        loop {
            write!(self.out, "\n> ")?;
            self.out.flush()?;

            let Some(line) = self.read_line()? else {
                writeln!(self.out)?;
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                writeln!(self.out, "Please enter a question or a command (/help).")?;
                continue;
            }

            let flow = match Command::parse(line) {
                Some(cmd) => self.handle_command(cmd)?,
                None => {
                    self.handle_query(line)?;
                    Flow::Continue
                }
            };
            if let Flow::Exit = flow {
                break;
            }
        }
        Ok(())
    }

    /// Next line without its line ending, `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = String::new();
        if self.input.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(buf.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn ask_yes_no(&mut self, prompt: &str) -> Result<bool> {
        write!(self.out, "{prompt} (y/N): ")?;
        self.out.flush()?;
        let answer = self.read_line()?.unwrap_or_default();
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    fn handle_query(&mut self, query: &str) -> Result<()> {
        match self.rag.ask(query) {
            Ok(answer) => {
                writeln!(self.out, "\n{}", answer.response.trim())?;
                if self.rag.config().filter.debug {
                    writeln!(self.out, "\n{}", filter_report(&answer.retrieval.filter))?;
                }
                if self.rag.config().debug {
                    writeln!(self.out, "\n--- prompt ---\n{}", answer.prompt)?;
                }
            }
            Err(e) => writeln!(self.out, "Error: {e}")?,
        }
        Ok(())
    }

    fn handle_command(&mut self, cmd: Command) -> Result<Flow> {
        match cmd {
            Command::Bye => {
                writeln!(self.out, "Goodbye!")?;
                return Ok(Flow::Exit);
            }
            Command::Help => writeln!(self.out, "{HELP}")?,
            Command::Info => match self.rag.info() {
                Ok(info) => writeln!(self.out, "{}", info_report(&info))?,
                Err(e) => writeln!(self.out, "Error getting system information: {e}")?,
            },
            Command::Context => self.add_context()?,
            Command::Clear => self.clear()?,
            Command::Model(name) => self.model(name)?,
            Command::Reload => self.reload()?,
            Command::Unknown(word) => {
                writeln!(self.out, "Unknown command: {word}. Type /help for commands.")?;
            }
        }
        Ok(Flow::Continue)
    }

    fn add_context(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "Enter your context. Type END on its own line to finish, or CANCEL to abort."
        )?;

        let mut lines = Vec::new();
        loop {
            let Some(line) = self.read_line()? else {
                writeln!(self.out, "Context input cancelled.")?;
                return Ok(());
            };
            match line.trim().to_uppercase().as_str() {
                "END" => break,
                "CANCEL" => {
                    writeln!(self.out, "Context input cancelled.")?;
                    return Ok(());
                }
                _ => lines.push(line),
            }
        }

        let text = lines.join("\n");
        if text.trim().is_empty() {
            writeln!(self.out, "No content entered. Context not saved.")?;
            return Ok(());
        }

        writeln!(self.out, "Preview:\n{}", truncate_str(&text, PREVIEW_CHARS))?;
        writeln!(self.out, "Total length: {} characters", text.chars().count())?;
        if !self.ask_yes_no("Save this context?")? {
            writeln!(self.out, "Context not saved.")?;
            return Ok(());
        }

        match self.rag.add_context(&text, USER_INPUT_SOURCE) {
            Ok(id) => writeln!(self.out, "Context saved ({id}).")?,
            Err(e) => writeln!(self.out, "Failed to save context: {e}")?,
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let count = match self.rag.document_count() {
            Ok(count) => count,
            Err(e) => {
                writeln!(self.out, "Error getting collection info: {e}")?;
                return Ok(());
            }
        };
        if count == 0 {
            writeln!(self.out, "The collection is already empty.")?;
            return Ok(());
        }

        writeln!(
            self.out,
            "The collection contains {count} document(s). This deletes all of them."
        )?;
        if !self.ask_yes_no("Clear all context?")? {
            writeln!(self.out, "Clear cancelled.")?;
            return Ok(());
        }
        write!(self.out, "This cannot be undone. Type DELETE to confirm: ")?;
        self.out.flush()?;
        if self.read_line()?.as_deref().map(str::trim) != Some("DELETE") {
            writeln!(self.out, "Clear cancelled.")?;
            return Ok(());
        }

        match self.rag.clear() {
            Ok(removed) => writeln!(self.out, "Cleared {removed} document(s).")?,
            Err(e) => writeln!(self.out, "Failed to clear collection: {e}")?,
        }
        Ok(())
    }

    fn model(&mut self, name: Option<String>) -> Result<()> {
        let available = self.rag.available_models();

        let Some(name) = name else {
            writeln!(self.out, "Current model: {}", self.rag.generation_model())?;
            match available {
                Ok(models) if models.is_empty() => writeln!(self.out, "The server reports no models.")?,
                Ok(models) => {
                    writeln!(self.out, "Available models:")?;
                    for m in models {
                        writeln!(self.out, "  {m}")?;
                    }
                }
                Err(e) => writeln!(self.out, "Could not list models: {e}")?,
            }
            writeln!(self.out, "Use /model <name> to switch.")?;
            return Ok(());
        };

        if name == self.rag.generation_model() {
            writeln!(self.out, "Already using {name}.")?;
            return Ok(());
        }

        match &available {
            Ok(models) if !is_listed(models, &name) => {
                warn!("model {name} not reported by the server");
                writeln!(
                    self.out,
                    "Warning: {name} is not installed. You may need to run: ollama pull {name}"
                )?;
            }
            Err(e) => writeln!(self.out, "Could not verify model: {e}")?,
            Ok(_) => {}
        }

        if self.ask_yes_no(&format!(
            "Switch from {} to {name}?",
            self.rag.generation_model()
        ))? {
            self.rag.set_generation_model(&name);
            writeln!(self.out, "Now using {name}.")?;
        } else {
            writeln!(self.out, "Model unchanged.")?;
        }
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        match Config::load(&self.config_path) {
            Ok(config) => {
                for w in self.rag.reload(config) {
                    writeln!(self.out, "Warning: {w}")?;
                }
                writeln!(self.out, "Configuration reloaded from {}.", self.config_path)?;
            }
            Err(e) => {
                writeln!(self.out, "Reload failed, keeping current configuration: {e:#}")?;
            }
        }
        Ok(())
    }
}

/// Ollama lists `name:tag`; a bare name matches its `latest` tag.
fn is_listed(models: &[String], name: &str) -> bool {
    models
        .iter()
        .any(|m| m == name || m.strip_suffix(":latest") == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistanceMetric;
    use crate::db::Db;
    use crate::embedder::mock::MockEmbedder;
    use crate::generator::{GenerationError, Generator};
    use std::sync::Arc;

    struct EchoGenerator;

    impl Generator for EchoGenerator {
        fn generate(&self, _model: &str, prompt: &str) -> Result<String, GenerationError> {
            if prompt.contains("### Context:") {
                Ok("answered with context".to_string())
            } else {
                Ok("answered without context".to_string())
            }
        }

        fn list_models(&self) -> Result<Vec<String>, GenerationError> {
            Ok(vec!["llama3.2:latest".to_string(), "mistral:7b".to_string()])
        }
    }

    fn pipeline(config: Config) -> RagPipeline {
        let store = Db::open_in_memory(8, DistanceMetric::Cosine).unwrap();
        RagPipeline::new(
            Box::new(store),
            Arc::new(MockEmbedder::new(8)),
            Arc::new(EchoGenerator),
            config,
        )
    }

    fn run(rag: &mut RagPipeline, input: &str) -> String {
        run_with_config(rag, input, "missing-config.json")
    }

    fn run_with_config(rag: &mut RagPipeline, input: &str, config_path: &str) -> String {
        let mut out = Vec::new();
        Session::new(rag, input.as_bytes(), &mut out, config_path)
            .run()
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_bye_and_help() {
        let mut rag = pipeline(Config::default());
        let out = run(&mut rag, "/help\n/bye\nnever read\n");
        assert!(out.contains("/context"));
        assert!(out.contains("Goodbye!"));
        assert!(!out.contains("answered"));
    }

    #[test]
    fn test_blank_and_unknown_input() {
        let mut rag = pipeline(Config::default());
        let out = run(&mut rag, "\n   \n/frobnicate\n");
        assert!(out.contains("Please enter a question"));
        assert!(out.contains("Unknown command: /frobnicate"));
    }

    #[test]
    fn test_context_save_flow() {
        let mut rag = pipeline(Config::default());
        let out = run(&mut rag, "/context\nline one\nline two\nEND\ny\n");
        assert!(out.contains("Preview:\nline one\nline two"));
        assert!(out.contains("Total length: 17 characters"));
        assert!(out.contains("Context saved (user_input_"));
        assert_eq!(rag.document_count().unwrap(), 1);
    }

    #[test]
    fn test_context_cancel_and_decline() {
        let mut rag = pipeline(Config::default());
        let out = run(&mut rag, "/context\nsomething\ncancel\n/context\nkept?\nend\nn\n");
        assert!(out.contains("Context input cancelled."));
        assert!(out.contains("Context not saved."));
        assert_eq!(rag.document_count().unwrap(), 0);
    }

    #[test]
    fn test_clear_requires_double_confirmation() {
        let mut rag = pipeline(Config::default());
        rag.add_context("one", USER_INPUT_SOURCE).unwrap();
        rag.add_context("two", USER_INPUT_SOURCE).unwrap();

        let out = run(&mut rag, "/clear\ny\ndelete\n");
        assert!(out.contains("contains 2 document(s)"));
        assert!(out.contains("Clear cancelled."));
        assert_eq!(rag.document_count().unwrap(), 2);

        let out = run(&mut rag, "/clear\nyes\nDELETE\n/clear\n");
        assert!(out.contains("Cleared 2 document(s)."));
        assert!(out.contains("already empty"));
        assert_eq!(rag.document_count().unwrap(), 0);
    }

    #[test]
    fn test_query_prints_answer_and_debug_report() {
        let mut config = Config::default();
        config.filter.debug = true;
        let mut rag = pipeline(config);

        let out = run(&mut rag, "what is rust?\n");
        assert!(out.contains("answered without context"));
        assert!(out.contains("Distance filter: 0 -> 0 candidates"));
    }

    #[test]
    fn test_model_listing_and_switch() {
        let mut rag = pipeline(Config::default());
        let out = run(&mut rag, "/model\n/model mistral:7b\ny\n/model llama3.2\n");

        assert!(out.contains("Current model: llama3.2"));
        assert!(out.contains("  mistral:7b"));
        assert!(out.contains("Now using mistral:7b."));
        assert!(!out.contains("not installed"));
        assert_eq!(rag.generation_model(), "mistral:7b");
    }

    #[test]
    fn test_model_switch_warns_when_unlisted() {
        let mut rag = pipeline(Config::default());
        let out = run(&mut rag, "/model gemma3:4b\nn\n");
        assert!(out.contains("ollama pull gemma3:4b"));
        assert!(out.contains("Model unchanged."));
        assert_eq!(rag.generation_model(), "llama3.2");
    }

    #[test]
    fn test_reload_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ragloop.json");
        std::fs::write(&path, r#"{"filter": {"enabled": false}}"#).unwrap();

        let mut rag = pipeline(Config::default());
        let out = run_with_config(&mut rag, "/reload\n", path.to_str().unwrap());
        assert!(out.contains("Configuration reloaded"));
        assert!(!rag.config().filter.enabled);
    }

    #[test]
    fn test_reload_failure_keeps_config() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ragloop.json");
        std::fs::write(&path, r#"{"filter": {"dynamic_ratio": 0.0}}"#).unwrap();

        let mut rag = pipeline(Config::default());
        let out = run_with_config(&mut rag, "/reload\n", path.to_str().unwrap());
        assert!(out.contains("Reload failed"));
        assert!(rag.config().filter.enabled);
        assert_eq!(rag.config().filter.dynamic_ratio, 0.7);
    }

    #[test]
    fn test_is_listed() {
        let models = vec!["llama3.2:latest".to_string(), "mistral:7b".to_string()];
        assert!(is_listed(&models, "llama3.2"));
        assert!(is_listed(&models, "mistral:7b"));
        assert!(!is_listed(&models, "mistral"));
    }
}
