//! Line-oriented console commands and their output formatting.

use anyhow::{bail, Context, Result};
use nbdebug_dap::{Breakpoint, SessionEvent, Variable};

pub const HELP: &str = "\
commands:
  start          run the handshake and execute the cell
  b <line>       toggle a breakpoint
  list           show breakpoints
  c              continue (stops the session when nothing is left)
  n              step over
  v              show variables of the current frame
  p <expr>       evaluate an expression
  stop           disconnect from the backend
  quit           stop and exit";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Toggle(u32),
    List,
    Continue,
    Next,
    Variables,
    Print(String),
    Stop,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "" => return Ok(None),
        "start" | "run" => ConsoleCommand::Start,
        "b" | "break" => {
            if rest.is_empty() {
                bail!("b needs a line number");
            }
            let line = rest
                .parse()
                .with_context(|| format!("invalid line number '{rest}'"))?;
            ConsoleCommand::Toggle(line)
        }
        "list" | "l" => ConsoleCommand::List,
        "c" | "continue" => ConsoleCommand::Continue,
        "n" | "next" => ConsoleCommand::Next,
        "v" | "vars" => ConsoleCommand::Variables,
        "p" | "print" => {
            if rest.is_empty() {
                bail!("p needs an expression");
            }
            ConsoleCommand::Print(rest.to_string())
        }
        "stop" => ConsoleCommand::Stop,
        "help" | "h" | "?" => ConsoleCommand::Help,
        "quit" | "q" | "exit" => ConsoleCommand::Quit,
        other => bail!("unknown command '{other}' (try 'help')"),
    };

    if !rest.is_empty() && !matches!(command, ConsoleCommand::Toggle(_) | ConsoleCommand::Print(_))
    {
        bail!("'{word}' takes no arguments");
    }
    Ok(Some(command))
}

/// Text of 1-based `line` in `source`, or empty past the end.
pub fn line_text(source: &str, line: u32) -> &str {
    let index = (line as usize).checked_sub(1);
    index
        .and_then(|i| source.lines().nth(i))
        .map(str::trim_end)
        .unwrap_or("")
}

pub fn format_breakpoints(breakpoints: &[Breakpoint]) -> String {
    if breakpoints.is_empty() {
        return "no breakpoints".to_string();
    }
    breakpoints
        .iter()
        .map(|bp| format!("{:>4}  {}", bp.line, bp.source_text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_variables(variables: &[Variable]) -> String {
    if variables.is_empty() {
        return "no variables".to_string();
    }
    variables
        .iter()
        .map(|var| match &var.variable_type {
            Some(ty) => format!("{}: {} = {}", var.name, ty, var.value),
            None => format!("{} = {}", var.name, var.value),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One-line description of a session notification.
pub fn describe_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::BreakpointsChanged(bps) => format!("[breakpoints: {}]", bps.len()),
        SessionEvent::ThreadStarted { thread_id } => format!("[thread {thread_id} started]"),
        SessionEvent::StartedChanged(true) => "[session started]".to_string(),
        SessionEvent::StartedChanged(false) => "[session stopped]".to_string(),
        SessionEvent::ProtocolViolation { request_seq } => {
            format!("[unexpected reply for request {request_seq}]")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<ConsoleCommand> {
        parse_command(line).unwrap()
    }

    #[test]
    fn console_parses_simple_commands() {
        assert_eq!(parse("start"), Some(ConsoleCommand::Start));
        assert_eq!(parse("  c "), Some(ConsoleCommand::Continue));
        assert_eq!(parse("n"), Some(ConsoleCommand::Next));
        assert_eq!(parse("v"), Some(ConsoleCommand::Variables));
        assert_eq!(parse("list"), Some(ConsoleCommand::List));
        assert_eq!(parse("stop"), Some(ConsoleCommand::Stop));
        assert_eq!(parse("quit"), Some(ConsoleCommand::Quit));
        assert_eq!(parse("?"), Some(ConsoleCommand::Help));
    }

    #[test]
    fn console_blank_line_is_nothing() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   \t"), None);
    }

    #[test]
    fn console_parses_arguments() {
        assert_eq!(parse("b 12"), Some(ConsoleCommand::Toggle(12)));
        assert_eq!(parse("break  3"), Some(ConsoleCommand::Toggle(3)));
        assert_eq!(
            parse("p len(items) + 1"),
            Some(ConsoleCommand::Print("len(items) + 1".into()))
        );
    }

    #[test]
    fn console_rejects_bad_input() {
        assert!(parse_command("b").is_err());
        assert!(parse_command("b -1").is_err());
        assert!(parse_command("p").is_err());
        assert!(parse_command("c now").is_err());
        assert!(parse_command("jump 4").is_err());
    }

    #[test]
    fn console_line_text_is_one_based() {
        let source = "x = 1\nitems = [1, 2]  \nprint(x)";
        assert_eq!(line_text(source, 1), "x = 1");
        assert_eq!(line_text(source, 2), "items = [1, 2]");
        assert_eq!(line_text(source, 0), "");
        assert_eq!(line_text(source, 9), "");
    }

    #[test]
    fn console_formats_variables() {
        let vars = vec![
            Variable {
                name: "x".into(),
                value: "1".into(),
                variable_type: Some("int".into()),
                variables_reference: 0,
            },
            Variable {
                name: "y".into(),
                value: "None".into(),
                variable_type: None,
                variables_reference: 0,
            },
        ];
        assert_eq!(format_variables(&vars), "x: int = 1\ny = None");
        assert_eq!(format_variables(&[]), "no variables");
    }

    #[test]
    fn console_formats_breakpoints() {
        let bps = vec![Breakpoint::new(3, "print(x)")];
        assert_eq!(format_breakpoints(&bps), "   3  print(x)");
        assert_eq!(format_breakpoints(&[]), "no breakpoints");
    }

    #[test]
    fn console_describes_events() {
        assert_eq!(
            describe_event(&SessionEvent::ThreadStarted { thread_id: 2 }),
            "[thread 2 started]"
        );
        assert_eq!(
            describe_event(&SessionEvent::StartedChanged(false)),
            "[session stopped]"
        );
    }
}
