use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, instrument};

static FILE_NAME_EXTRA_CHARS: &str = "-_.() ";

/// Keep ASCII alphanumerics and `-_.() `, then turn spaces into underscores.
pub fn sanitize_file_name(title: &str) -> String {
    let safe: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || FILE_NAME_EXTRA_CHARS.contains(*c))
        .collect::<String>()
        .replace(' ', "_");
    if safe.is_empty() {
        "output".to_owned()
    } else {
        safe
    }
}

/// Chooses which master list to process.
pub trait SelectionProvider {
    /// Index into `choices`, or `None` when nothing was chosen.
    fn select(&self, choices: &[String]) -> Result<Option<usize>>;
}

/// Numbered menu on stdin.
pub struct StdinPicker;

impl SelectionProvider for StdinPicker {
    fn select(&self, choices: &[String]) -> Result<Option<usize>> {
        if choices.is_empty() {
            return Ok(None);
        }
        println!("Choose a title to download:");
        for (i, choice) in choices.iter().enumerate() {
            println!("  {}) {}", i + 1, choice);
        }
        loop {
            let n = prompt_number("Number", &mut io::stdin().lock())?;
            if (1..=choices.len()).contains(&n) {
                return Ok(Some(n - 1));
            }
            println!("Pick a number between 1 and {}", choices.len());
        }
    }
}

/// Selection fixed up front, e.g. by `--list`. Accepts the name with or without `.txt`.
pub struct NamedPicker(pub String);

impl SelectionProvider for NamedPicker {
    fn select(&self, choices: &[String]) -> Result<Option<usize>> {
        let wanted = self.0.trim_end_matches(".txt");
        Ok(choices
            .iter()
            .position(|c| c.trim_end_matches(".txt") == wanted))
    }
}

/// Ask for a positive number until one is given. Fails on end of input.
#[instrument(skip(input))]
pub fn prompt_number(label: &str, input: &mut impl BufRead) -> Result<usize> {
    loop {
        print!("{}: ", label);
        io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            anyhow::bail!("no input for {}", label);
        }
        debug!("user input: {}", line.trim());
        match line.trim().parse::<usize>() {
            Ok(n) => return Ok(n),
            Err(_) => println!("'{}' is not a number", line.trim()),
        }
    }
}

pub fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_owned())
}

pub fn format_elapsed(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms >= 60000 {
        let mins = total_ms / 60000;
        let secs = (total_ms % 60000) / 1000;
        format!("{}m {}s", mins, secs)
    } else if total_ms >= 1000 {
        let secs = total_ms / 1000;
        let ms_remaining = total_ms % 1000;
        if ms_remaining > 0 {
            format!("{}s {}ms", secs, ms_remaining)
        } else {
            format!("{}s", secs)
        }
    } else {
        format!("{}ms", total_ms)
    }
}

pub fn display_elapsed_time(duration: Duration) {
    info!("Finished in {}", format_elapsed(duration));
}
