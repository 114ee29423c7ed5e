use crate::query::{QueryError, ViewState};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    TotalValue,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Formats an `Option<T>` into a `Cell`. `None` is displayed as "N/A".
pub fn format_optional_cell<T>(value: Option<T>, format_fn: impl Fn(T) -> String) -> Cell {
    value.map_or(
        Cell::new("N/A")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
        |v| Cell::new(format_fn(v)).set_alignment(CellAlignment::Right),
    )
}

/// Right-aligned number with a fixed number of decimals.
pub fn number_cell(value: f64, decimals: usize) -> Cell {
    Cell::new(format!("{value:.decimals$}")).set_alignment(CellAlignment::Right)
}

/// Creates a cell for displaying a signed value with color coding.
pub fn change_cell(change: f64, suffix: &str) -> Cell {
    let text = format!("{change:+.2}{suffix}");
    let color = if change >= 0.0 { Color::Green } else { Color::Red };
    Cell::new(text).fg(color).set_alignment(CellAlignment::Right)
}

/// Title line followed by a table.
pub fn titled(title: &str, table: &Table) -> String {
    format!("{}\n{table}", style_text(title, StyleType::Title))
}

/// Renders the non-data states of a query; `None` means there is data and
/// the caller renders it. A refresh in progress adds a subtle marker.
pub fn status_line<T>(title: &str, view: &ViewState<'_, T>) -> Option<String> {
    let line = match view {
        ViewState::Idle => format!("{title}: {}", style_text("not loaded", StyleType::Subtle)),
        ViewState::Loading => format!("{title}: {}", style_text("loading...", StyleType::Subtle)),
        ViewState::Error(err) => format!(
            "{title}: {}",
            style_text(&error_message(err), StyleType::Error)
        ),
        ViewState::Ready { .. } => return None,
    };
    Some(line)
}

pub fn refreshing_marker<T>(view: &ViewState<'_, T>) -> &'static str {
    match view {
        ViewState::Ready {
            refreshing: true, ..
        } => " (refreshing)",
        _ => "",
    }
}

pub fn error_message(err: &QueryError) -> String {
    format!("failed to load: {}", err.api_error())
}

/// Creates a spinner for waiting on queries.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Prints a separator line matching the terminal width.
pub fn separator() -> String {
    let term_width = console::Term::stdout()
        .size_checked()
        .map(|(_, w)| w as usize)
        .unwrap_or(80);
    "─".repeat(term_width)
}
