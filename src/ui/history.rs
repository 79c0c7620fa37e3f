use chrono::{DateTime, Local};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::Span,
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table},
    Frame,
};
use time_humanize::HumanTime;

use typepace::{history::HistorySummary, report::HistoryEntry};

use super::charting;
use crate::App;

/// "5 minutes ago" style age of a stored result
pub fn age_label(created_at: DateTime<Local>, now: DateTime<Local>) -> String {
    let secs = (now - created_at).num_seconds().max(0);
    HumanTime::from_seconds(-secs).to_string()
}

/// Pure presenter for a single history row
pub fn present_row(entry: &HistoryEntry, now: DateTime<Local>) -> Row<'static> {
    let r = &entry.result;

    let acc_color = if r.accuracy >= 95 {
        Color::Green
    } else if r.accuracy >= 85 {
        Color::Yellow
    } else {
        Color::Red
    };

    Row::new(vec![
        Cell::from(r.wpm.to_string()).style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(format!("{}%", r.accuracy)).style(Style::default().fg(acc_color)),
        Cell::from(format!("{}s", r.elapsed_secs)),
        Cell::from(r.errors.to_string()),
        Cell::from(format!("{}/{}", r.raw_wpm, r.net_wpm)),
        Cell::from(age_label(entry.created_at, now)),
    ])
}

/// (result number, wpm) pairs, oldest result first
pub fn progress_points(entries: &[HistoryEntry]) -> Vec<(f64, f64)> {
    entries
        .iter()
        .rev()
        .enumerate()
        .map(|(i, entry)| ((i + 1) as f64, f64::from(entry.result.wpm)))
        .collect()
}

fn render_progress(entries: &[HistoryEntry], area: Rect, f: &mut Frame) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let points = progress_points(entries);
    let (last_result, highest_wpm) = charting::compute_chart_params(&points, 1.0);
    // a single result still needs a non-empty x range
    let last_result = last_result.max(2.0);
    let highest_wpm = highest_wpm.max(1.0);

    let datasets = vec![Dataset::default()
        .marker(Marker::Braille)
        .style(Style::default().fg(Color::Magenta))
        .graph_type(GraphType::Line)
        .data(&points)];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .x_axis(
            Axis::default()
                .title("result")
                .bounds([1.0, last_result])
                .labels(vec![
                    Span::styled("1", bold_style),
                    Span::styled(charting::format_label(last_result), bold_style),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, highest_wpm])
                .labels(vec![
                    Span::styled("0", bold_style),
                    Span::styled(charting::format_label(highest_wpm), bold_style),
                ]),
        );
    f.render_widget(chart, area);
}

fn summary_text(summary: Option<&HistorySummary>) -> String {
    match summary {
        Some(s) => format!(
            "{} results   avg {:.1} wpm   best {} wpm   sd {:.2}   avg {:.1}% acc   avg {:.0}s",
            s.count, s.avg_wpm, s.best_wpm, s.wpm_std_dev, s.avg_accuracy, s.avg_time_secs
        ),
        None => "No results recorded yet".to_string(),
    }
}

/// Render the History screen
pub fn render_history(app: &mut App, f: &mut Frame) {
    let area = f.area();
    let view = &mut app.history;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // Title + summary
            Constraint::Min(0),    // Progress chart + results table
            Constraint::Length(2), // Instructions
        ])
        .split(area);

    let title = Paragraph::new(summary_text(view.summary.as_ref()))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("History ({})", view.filter)),
        )
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    if let Some(err) = &view.error {
        let failed = Paragraph::new(format!("Could not load results: {err}"))
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Red));
        f.render_widget(failed, chunks[1]);
    } else if view.entries.is_empty() {
        let no_data = Paragraph::new("Nothing in this time window. Finish a session to see it here.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray));
        f.render_widget(no_data, chunks[1]);
    } else {
        let body = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(45), Constraint::Min(0)])
            .split(chunks[1]);
        render_progress(&view.entries, body[0], f);

        let table_height = body[1].height.saturating_sub(3) as usize; // borders + header
        let max_scroll = view.entries.len().saturating_sub(table_height);
        view.scroll_offset = view.scroll_offset.min(max_scroll);

        let header = Row::new(vec!["WPM", "Acc", "Time", "Errors", "Raw/Net", "When"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        let now = Local::now();
        let rows: Vec<Row> = view
            .entries
            .iter()
            .skip(view.scroll_offset)
            .take(table_height)
            .map(|entry| present_row(entry, now))
            .collect();

        let widths = [
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Min(12),
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title("Results"))
            .column_spacing(2);
        f.render_widget(table, body[1]);
    }

    let instructions =
        Paragraph::new("(↑/↓) scroll  (f) filter  (b/backspace) back  (r) retry  (esc)ape")
            .alignment(Alignment::Center)
            .wrap(ratatui::widgets::Wrap { trim: true });
    f.render_widget(instructions, chunks[2]);
}
