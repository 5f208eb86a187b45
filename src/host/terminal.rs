use crate::host::{Host, PromptLevel};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

#[derive(Default)]
struct PromptSlot {
    pending: Option<oneshot::Sender<String>>,
    input_closed: bool,
}

/// Host backed by the controlling terminal.
///
/// A single reader owns stdin. While a prompt is waiting, the next line answers
/// it; every other line is forwarded as a command to the receiver returned by
/// [`TerminalHost::spawn`].
#[derive(Clone)]
pub struct TerminalHost {
    slot: Arc<Mutex<PromptSlot>>,
    assume_yes: bool,
}

impl TerminalHost {
    /// Create a host and start the stdin reader task
    pub fn spawn(assume_yes: bool) -> (Self, mpsc::UnboundedReceiver<String>) {
        let host = Self {
            slot: Arc::new(Mutex::new(PromptSlot::default())),
            assume_yes,
        };
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let reader_host = host.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(command) = reader_host.route_line(line) {
                    if command_tx.send(command).is_err() {
                        break;
                    }
                }
            }
            reader_host.close_input();
            debug!("Terminal input closed");
        });

        (host, command_rx)
    }

    /// Hand `line` to a waiting prompt, or give it back when nothing is waiting
    pub fn route_line(&self, line: String) -> Option<String> {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        match slot.pending.take() {
            Some(answer_tx) => {
                // A prompt dropped by its caller gives the line back to the command stream
                answer_tx.send(line).err()
            }
            None => Some(line),
        }
    }

    fn close_input(&self) {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.input_closed = true;
        slot.pending = None;
    }

    fn register_prompt(&self) -> Option<oneshot::Receiver<String>> {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.input_closed {
            return None;
        }
        let (answer_tx, answer_rx) = oneshot::channel();
        slot.pending = Some(answer_tx);
        Some(answer_rx)
    }
}

/// Map a typed answer onto one of the offered choices
pub fn match_choice(answer: &str, choices: &[&str]) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }

    if let Ok(index) = answer.parse::<usize>() {
        return choices
            .get(index.checked_sub(1)?)
            .map(|choice| choice.to_string());
    }

    if let Some(choice) = choices
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(answer))
    {
        return Some(choice.to_string());
    }

    // "y"/"yes" accepts the first, affirmative, choice
    if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
        return choices.first().map(|choice| choice.to_string());
    }

    None
}

#[async_trait]
impl Host for TerminalHost {
    fn show_info(&self, message: &str) {
        println!("{message}");
    }

    fn show_warning(&self, message: &str) {
        eprintln!("Warning: {message}");
    }

    fn show_error(&self, message: &str) {
        eprintln!("Error: {message}");
    }

    async fn prompt(&self, level: PromptLevel, message: &str, choices: &[&str]) -> Option<String> {
        if self.assume_yes {
            let choice = choices.first().map(|choice| choice.to_string());
            println!("[{level}] {message} -> {}", choice.as_deref().unwrap_or("-"));
            return choice;
        }

        let answer_rx = self.register_prompt()?;

        let options = choices
            .iter()
            .enumerate()
            .map(|(i, choice)| format!("{}) {choice}", i + 1))
            .collect::<Vec<_>>()
            .join("  ");
        println!("[{level}] {message}");
        println!("  {options}  (anything else dismisses)");

        let answer = answer_rx.await.ok()?;
        match_choice(&answer, choices)
    }

    fn progress_started(&self, title: &str) {
        println!("{title}");
    }

    fn progress_finished(&self, title: &str) {
        debug!("Progress finished: {}", title);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_host() -> TerminalHost {
        TerminalHost {
            slot: Arc::new(Mutex::new(PromptSlot::default())),
            assume_yes: false,
        }
    }

    #[test]
    fn test_match_choice() {
        let choices = ["Install", "Cancel"];
        assert_eq!(match_choice("install", &choices), Some("Install".to_string()));
        assert_eq!(match_choice("2", &choices), Some("Cancel".to_string()));
        assert_eq!(match_choice("y", &choices), Some("Install".to_string()));
        assert_eq!(match_choice("0", &choices), None);
        assert_eq!(match_choice("3", &choices), None);
        assert_eq!(match_choice("", &choices), None);
        assert_eq!(match_choice("maybe", &choices), None);
    }

    #[test]
    fn test_route_line_without_prompt_is_a_command() {
        let host = test_host();
        assert_eq!(host.route_line("start".to_string()), Some("start".to_string()));
    }

    #[tokio::test]
    async fn test_prompt_consumes_next_line() {
        let host = test_host();
        let prompt_host = host.clone();
        let prompt = tokio::spawn(async move {
            prompt_host
                .prompt(PromptLevel::Warning, "Install it?", &["Install", "Cancel"])
                .await
        });

        // Wait for the prompt to register before answering
        loop {
            if host.slot.lock().unwrap().pending.is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(host.route_line("1".to_string()), None);
        assert_eq!(prompt.await.unwrap(), Some("Install".to_string()));
    }

    #[tokio::test]
    async fn test_prompt_after_input_closed_is_dismissed() {
        let host = test_host();
        host.close_input();
        let answer = host.prompt(PromptLevel::Info, "Update?", &["Update Now"]).await;
        assert_eq!(answer, None);
    }

    #[tokio::test]
    async fn test_assume_yes_picks_first_choice() {
        let host = TerminalHost {
            slot: Arc::new(Mutex::new(PromptSlot::default())),
            assume_yes: true,
        };
        let answer = host.prompt(PromptLevel::Info, "Update?", &["Update Now"]).await;
        assert_eq!(answer, Some("Update Now".to_string()));
    }
}
