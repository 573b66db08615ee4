//! Terminal interaction: prompts, notifications and progress.

pub mod icons;
pub mod progress;

use anyhow::Result;
use console::style;
use dialoguer::{Select, theme::ColorfulTheme};

pub use progress::Spinner;

use icons::{CHECK, CROSS};

/// The user-facing side effects commands need. Tests substitute a scripted
/// implementation.
pub trait UserInterface {
    /// Let the user choose one of `choices`. `None` when they cancel.
    fn pick(&self, prompt: &str, choices: &[String]) -> Result<Option<usize>>;

    fn show_info(&self, message: &str);

    fn show_error(&self, message: &str);
}

#[derive(Debug, Default)]
pub struct TerminalUi;

impl UserInterface for TerminalUi {
    fn pick(&self, prompt: &str, choices: &[String]) -> Result<Option<usize>> {
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(choices)
            .default(0)
            .interact_opt()?;
        Ok(selection)
    }

    fn show_info(&self, message: &str) {
        println!("{}{}", CHECK, message);
    }

    fn show_error(&self, message: &str) {
        eprintln!("{}{}", CROSS, style(message).red());
    }
}
