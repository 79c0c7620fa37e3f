pub mod charting;
pub mod history;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use typepace::{
    config::PRESET_DURATIONS,
    metrics,
    report::{SaveStatus, SessionResult},
    session::SessionState,
};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match (self.state, self.last_result) {
            (AppState::Results, Some(result)) => render_results(self, &result, area, buf),
            _ => render_typing(self, area, buf),
        }
    }
}

fn render_typing(app: &App, area: Rect, buf: &mut Buffer) {
    let session = app.engine.session();
    let live = session.snapshot();
    let passage = session.passage();

    // styles
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
    let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
    let dim_bold_style = Style::default()
        .patch(bold_style)
        .add_modifier(Modifier::DIM);
    let underlined_dim_bold_style = Style::default()
        .patch(dim_bold_style)
        .add_modifier(Modifier::UNDERLINED);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let prompt_occupied_lines = if passage.width() <= max_chars_per_line as usize {
        1
    } else {
        ((passage.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16
    };
    let padding = area.height.saturating_sub(prompt_occupied_lines + 6) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(padding),
            Constraint::Length(1), // durations
            Constraint::Length(2), // time left
            Constraint::Length(prompt_occupied_lines),
            Constraint::Length(2), // live metrics
            Constraint::Min(0),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let durations = PRESET_DURATIONS
        .iter()
        .map(|&secs| {
            let label = format!(" {secs}s ");
            if secs == live.duration_secs {
                Span::styled(label, Style::default().patch(bold_style).fg(Color::Cyan))
            } else {
                Span::styled(label, dim_bold_style)
            }
        })
        .collect::<Vec<Span>>();
    Paragraph::new(Line::from(durations))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        format!("{}s", live.remaining_secs),
        dim_bold_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    let mut expected = passage.chars();
    let mut spans = session
        .typed()
        .chars()
        .map(|typed| match expected.next() {
            Some(want) if want == typed => Span::styled(want.to_string(), green_bold_style),
            _ => Span::styled(
                match typed {
                    ' ' => "·".to_owned(),
                    '\n' => "⏎".to_owned(),
                    c => c.to_string(),
                },
                red_bold_style,
            ),
        })
        .collect::<Vec<Span>>();

    if let Some(cursor) = expected.next() {
        spans.push(Span::styled(cursor.to_string(), underlined_dim_bold_style));
    }
    spans.push(Span::styled(expected.collect::<String>(), dim_bold_style));

    Paragraph::new(Line::from(spans))
        .alignment(if prompt_occupied_lines == 1 {
            // a passage that fits on one line reads best centered
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true })
        .render(chunks[3], buf);

    let metrics_line = match app.notice {
        Some(notice) => Span::styled(notice, Style::default().fg(Color::Yellow)),
        None => Span::styled(
            format!(
                "{} wpm   {}% acc   {} errors   {} keys",
                live.wpm, live.accuracy, live.errors, live.keystrokes
            ),
            bold_style,
        ),
    };
    Paragraph::new(metrics_line)
        .alignment(Alignment::Center)
        .render(chunks[4], buf);

    let legend = if live.state == SessionState::Idle {
        "(↑/↓) duration / (tab) new passage / (esc)ape"
    } else {
        "(esc)ape"
    };
    Paragraph::new(Span::styled(legend, italic_style)).render(chunks[6], buf);
}

fn render_results(app: &App, result: &SessionResult, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);
    let magenta_style = Style::default().fg(Color::Magenta);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // chart
            Constraint::Length(1), // headline stats
            Constraint::Length(1), // detail stats
            Constraint::Length(1), // save status
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let tuples: Vec<(f64, f64)> = app
        .engine
        .session()
        .history()
        .points(result.elapsed_secs as usize)
        .into_iter()
        .map(Into::into)
        .collect();
    let (overall_duration, highest_wpm) =
        charting::compute_chart_params(&tuples, f64::from(result.elapsed_secs));

    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(magenta_style)
        .graph_type(GraphType::Line)
        .data(&tuples)];

    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("seconds")
                .bounds([1.0, overall_duration])
                .labels(vec![
                    Span::styled("1", bold_style),
                    Span::styled(charting::format_label(overall_duration), bold_style),
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
    chart.render(chunks[0], buf);

    Paragraph::new(Span::styled(
        format!(
            "{} wpm   {}% acc   {}s   {} errors",
            result.wpm, result.accuracy, result.elapsed_secs, result.errors
        ),
        bold_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        format!(
            "raw {} / net {} wpm   {} chars   {} words   {} keys   {:.1}% err   {:.0}% done",
            result.raw_wpm,
            result.net_wpm,
            result.characters,
            result.words,
            result.keystrokes,
            metrics::error_rate(result.errors, result.characters),
            result.completion
        ),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    let status = app.engine.save_status();
    let status_style = match status {
        SaveStatus::Saved => Style::default().fg(Color::Green),
        SaveStatus::Failed => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        SaveStatus::Idle => Style::default().fg(Color::Gray),
    };
    Paragraph::new(Span::styled(status.to_string(), status_style))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    let legend = if status == SaveStatus::Failed {
        "(r)etry / (s)ave again / (h)istory / (esc)ape"
    } else {
        "(r)etry / (h)istory / (esc)ape"
    };
    Paragraph::new(Span::styled(legend, italic_style)).render(chunks[5], buf);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::App;
    use ratatui::{buffer::Buffer, layout::Rect};
    use typepace::{
        clock::SystemClock,
        config::{Config, FileConfigStore},
        history::MemoryStore,
        passage::PassageSource,
        runtime::TickTimer,
        session::{SessionEngine, SessionEvent},
    };

    /// Timer that never fires; sessions in these tests end by completion.
    #[derive(Default)]
    pub(crate) struct NoopTimer {
        running: bool,
    }

    impl TickTimer for NoopTimer {
        fn start(&mut self) {
            self.running = true;
        }

        fn stop(&mut self) {
            self.running = false;
        }

        fn is_running(&self) -> bool {
            self.running
        }
    }

    pub(crate) fn buffer_text(buf: &Buffer) -> String {
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    fn create_test_app(prompt: &str, finished: bool) -> App {
        let store = MemoryStore::new();
        let engine = SessionEngine::new(
            30,
            PassageSource::fixed(prompt),
            SystemClock,
            Box::new(NoopTimer::default()),
            Box::new(store.clone()),
        );
        let config_path = std::env::temp_dir().join("typepace-ui-tests.json");
        let mut app = App::new(
            engine,
            Box::new(store),
            Config::default(),
            Box::new(FileConfigStore::with_path(config_path)),
        );

        if finished {
            for c in prompt.chars() {
                let result = app
                    .engine
                    .handle(SessionEvent::Edit(typepace::input::Edit::Insert(c)));
                if let Some(result) = result {
                    app.last_result = Some(result);
                    app.state = AppState::Results;
                }
            }
        }
        app
    }

    fn render(app: &App, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer_text(&buffer)
    }

    #[test]
    fn test_typing_screen_shows_passage_and_timer() {
        let app = create_test_app("hello world", false);
        let rendered = render(&app, 80, 24);

        assert!(rendered.contains("hello world"));
        assert!(rendered.contains("30s"));
        assert!(rendered.contains("100% acc"));
        assert!(rendered.contains("(tab) new passage"));
    }

    #[test]
    fn test_typing_screen_shows_mistakes_inline() {
        let mut app = create_test_app("ab cd", false);
        for c in "abx".chars() {
            app.engine
                .handle(SessionEvent::Edit(typepace::input::Edit::Insert(c)));
        }

        let rendered = render(&app, 80, 24);
        assert!(rendered.contains("abxcd"));
        assert!(rendered.contains("1 errors"));
        assert!(rendered.contains("(esc)ape"));
        assert!(!rendered.contains("new passage"));
    }

    #[test]
    fn test_typing_screen_shows_notice() {
        let mut app = create_test_app("hello", false);
        app.notice = Some("pasting is disabled");

        assert!(render(&app, 80, 24).contains("pasting is disabled"));
    }

    #[test]
    fn test_results_screen_shows_stats_and_save_status() {
        let app = create_test_app("test", true);
        let rendered = render(&app, 100, 24);

        assert!(rendered.contains("wpm"));
        assert!(rendered.contains("100% acc"));
        assert!(rendered.contains("results saved"));
        assert!(rendered.contains("(h)istory"));
    }

    #[test]
    fn test_wrapped_long_passage_renders() {
        let long = "lorem ipsum dolor sit amet ".repeat(20);
        let app = create_test_app(long.trim(), false);
        let rendered = render(&app, 60, 30);
        assert!(rendered.contains("lorem"));
    }

    #[test]
    fn test_extreme_sizes_do_not_panic() {
        let app = create_test_app("hello world", false);
        for (w, h) in [(1, 1), (5, 3), (12, 4), (200, 60)] {
            render(&app, w, h);
        }
        let done = create_test_app("hi", true);
        for (w, h) in [(1, 1), (5, 3), (12, 4), (200, 60)] {
            render(&done, w, h);
        }
    }
}
