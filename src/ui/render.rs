//! TUI rendering with ratatui.

use crate::analyzer::{ConfigurationOutcome, TransferKind, TransferRecord};
use crate::hexdump;
use crate::model::function_name;
use crate::ui::app::{App, ViewMode};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

/// Main render function.
pub fn render(frame: &mut Frame, app: &App) {
    // Main layout: content area + footer
    let outer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    // Content area: list on left, details on right
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(outer_chunks[0]);

    match app.view_mode {
        ViewMode::Records => render_records(frame, app, main_chunks[0]),
        ViewMode::Endpoints => render_endpoints(frame, app, main_chunks[0]),
    }

    render_details(frame, app, main_chunks[1]);
    render_footer(frame, app, outer_chunks[1]);

    if app.show_help {
        render_help(frame);
    }
}

fn selected_style(style: Style, is_selected: bool) -> Style {
    if is_selected {
        style.bg(Color::DarkGray).add_modifier(Modifier::BOLD)
    } else {
        style
    }
}

fn kind_color(kind: &TransferKind) -> Color {
    match kind {
        TransferKind::SelectConfiguration(ConfigurationOutcome::Rejected(_)) => Color::Red,
        TransferKind::SelectConfiguration(_) => Color::Magenta,
        TransferKind::Control { .. } | TransferKind::Descriptor { .. } => Color::Cyan,
        TransferKind::BulkOrInterrupt { .. } => Color::Green,
        TransferKind::Isochronous { .. } => Color::Yellow,
        TransferKind::Unknown { .. } => Color::DarkGray,
        TransferKind::Malformed { .. } => Color::Red,
    }
}

fn render_records(frame: &mut Frame, app: &App, area: Rect) {
    let list_items: Vec<ListItem> = app
        .records
        .iter()
        .enumerate()
        .map(|(i, collected)| {
            let record = &collected.record;
            let is_selected = i == app.selected;

            let mut spans = vec![
                Span::styled(
                    format!("usb{:<3}", collected.root_hub),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(format!("{:<9}", record.phase)),
                Span::styled(
                    format!("{:<18}", record.kind.name()),
                    selected_style(Style::default().fg(kind_color(&record.kind)), is_selected),
                ),
            ];

            if let Some(endpoint) = &record.endpoint {
                spans.push(Span::raw(format!(
                    " EP{:02X} {}",
                    endpoint.address, endpoint.transfer_type
                )));
            } else if record.pipe.is_some_and(|p| !p.is_null()) {
                spans.push(Span::styled(" ?", Style::default().fg(Color::Red)));
            }
            if let Some(label) = record.pipe.and_then(|p| app.pipe_label(p)) {
                spans.push(Span::styled(
                    format!(" {}", label),
                    Style::default().fg(Color::LightBlue),
                ));
            }
            if let Some(length) = record.buffer_length {
                spans.push(Span::styled(
                    format!(" [{}]", length),
                    Style::default().fg(Color::DarkGray),
                ));
            }

            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(list_items).block(
        Block::default()
            .title(format!(" Records: {} ", app.summary_str()))
            .borders(Borders::ALL),
    );

    let mut state = ListState::default().with_selected(Some(app.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_endpoints(frame: &mut Frame, app: &App, area: Rect) {
    let mut last_hub = None;
    let mut list_items = Vec::new();
    let mut selected_row = None;

    for (i, row) in app.endpoints.iter().enumerate() {
        if last_hub != Some(row.root_hub) {
            last_hub = Some(row.root_hub);
            list_items.push(ListItem::new(Line::from(Span::styled(
                format!("Root hub usb{}", row.root_hub),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))));
        }

        let is_selected = i == app.selected;
        if is_selected {
            selected_row = Some(list_items.len());
        }

        let endpoint = &row.endpoint;
        let mut spans = vec![
            Span::raw("  "),
            Span::styled(
                endpoint.pipe.to_string(),
                selected_style(Style::default().fg(Color::Cyan), is_selected),
            ),
            Span::raw(format!("  {}", endpoint)),
        ];
        if let Some(label) = app.pipe_label(endpoint.pipe) {
            spans.push(Span::styled(
                format!("  {}", label),
                Style::default().fg(Color::LightBlue),
            ));
        }
        list_items.push(ListItem::new(Line::from(spans)));
    }

    let list = List::new(list_items).block(
        Block::default()
            .title(format!(" Endpoints ({}) ", app.endpoints.len()))
            .borders(Borders::ALL),
    );

    let mut state = ListState::default().with_selected(selected_row);
    frame.render_stateful_widget(list, area, &mut state);
}

fn field<'a>(name: &'a str, value: String) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{}: ", name), Style::default().fg(Color::DarkGray)),
        Span::raw(value),
    ])
}

fn heading(text: &str) -> Line<'_> {
    Line::from(Span::styled(
        text,
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))
}

fn record_lines<'a>(app: &'a App, root_hub: u8, record: &'a TransferRecord<'static>) -> Vec<Line<'a>> {
    let mut lines = vec![heading("Request Details"), Line::from("")];

    lines.push(field("Root hub", format!("usb{}", root_hub)));
    lines.push(field("Phase", record.phase.to_string()));
    let code = record.function.code();
    lines.push(field(
        "Function",
        format!("{} ({:#06x})", function_name(code).unwrap_or("UNKNOWN"), code),
    ));
    if record.status != 0 {
        lines.push(Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{:#010x}", record.status),
                Style::default().fg(Color::Red),
            ),
        ]));
    }
    if let Some(pipe) = record.pipe {
        let label = app
            .pipe_label(pipe)
            .map(|l| format!(" ({})", l))
            .unwrap_or_default();
        lines.push(field("Pipe", format!("{}{}", pipe, label)));
        lines.push(field(
            "Endpoint",
            record
                .endpoint
                .map(|ep| ep.to_string())
                .unwrap_or_else(|| "not registered".to_string()),
        ));
    }
    if let Some(direction) = record.direction() {
        lines.push(field("Direction", direction.to_string()));
    }

    match &record.kind {
        TransferKind::SelectConfiguration(outcome) => {
            let text = match outcome {
                ConfigurationOutcome::Pending => "pending completion".to_string(),
                ConfigurationOutcome::Registered(summary) => format!(
                    "{} interface(s), {} pipe(s) registered",
                    summary.interfaces, summary.pipes
                ),
                ConfigurationOutcome::Rejected(err) => format!("rejected: {}", err),
            };
            lines.push(field("Configuration", text));
        }
        TransferKind::Control {
            setup,
            flags,
            timeout_ms,
        } => {
            lines.push(field("Setup", setup.to_string()));
            lines.push(field("Flags", format!("{:?}", flags)));
            if let Some(timeout) = timeout_ms {
                lines.push(field("Timeout", format!("{} ms", timeout)));
            }
        }
        TransferKind::BulkOrInterrupt { flags } => {
            lines.push(field("Flags", format!("{:?}", flags)));
        }
        TransferKind::Isochronous {
            flags,
            packet_count,
            start_frame,
            error_count,
        } => {
            lines.push(field("Flags", format!("{:?}", flags)));
            lines.push(field("Packets", packet_count.to_string()));
            lines.push(field("Start frame", start_frame.to_string()));
            lines.push(field("Errors", error_count.to_string()));
        }
        TransferKind::Descriptor {
            request,
            descriptor_type,
            index,
            language_id,
        } => {
            lines.push(field("Request", request.to_string()));
            lines.push(field("Type", descriptor_type.to_string()));
            lines.push(field("Index", index.to_string()));
            lines.push(field("Language", format!("{:#06x}", language_id)));
        }
        TransferKind::Unknown { function } => {
            lines.push(field("Raw function", format!("{:#06x}", function)));
        }
        TransferKind::Malformed { function, error } => {
            if let Some(function) = function {
                lines.push(field("Raw function", format!("{:#06x}", function)));
            }
            lines.push(field("Error", error.to_string()));
        }
    }

    if let Some(length) = record.buffer_length {
        lines.push(Line::from(""));
        match &record.buffer {
            Some(buffer) => {
                let kept = if buffer.len() < length as usize {
                    format!(" (showing {})", buffer.len())
                } else {
                    String::new()
                };
                lines.push(heading("Buffer"));
                lines.push(field("Length", format!("{}{}", length, kept)));
                lines.extend(
                    hexdump::dump_lines(buffer, 8)
                        .into_iter()
                        .map(|line| Line::from(Span::styled(line, Style::default().fg(Color::Gray)))),
                );
            }
            None => lines.push(field("Buffer", format!("none ({} bytes requested)", length))),
        }
    }

    lines
}

fn render_details(frame: &mut Frame, app: &App, area: Rect) {
    let lines = if let Some(collected) = app.selected_record() {
        record_lines(app, collected.root_hub, &collected.record)
    } else if let Some(row) = app.selected_endpoint() {
        let endpoint = &row.endpoint;
        let mut lines = vec![heading("Endpoint Details"), Line::from("")];
        lines.push(field("Root hub", format!("usb{}", row.root_hub)));
        lines.push(field("Pipe", endpoint.pipe.to_string()));
        if let Some(label) = app.pipe_label(endpoint.pipe) {
            lines.push(field("Label", label.to_string()));
        }
        lines.push(field("Address", format!("{:#04x}", endpoint.address)));
        lines.push(field("Number", endpoint.number().to_string()));
        lines.push(field("Direction", endpoint.direction().to_string()));
        lines.push(field("Type", endpoint.transfer_type.to_string()));
        lines.push(field("Device", endpoint.device_address.to_string()));
        lines.push(field(
            "Records",
            app.records_for(row.root_hub, endpoint.pipe).to_string(),
        ));
        lines
    } else {
        vec![Line::from(Span::styled(
            "Nothing selected",
            Style::default().fg(Color::DarkGray),
        ))]
    };

    let paragraph = Paragraph::new(lines)
        .block(Block::default().title(" Details ").borders(Borders::ALL))
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame) {
    let area = centered_rect(50, 60, frame.area());

    frame.render_widget(Clear, area);

    let help_text = vec![
        Line::from(Span::styled(
            "urbtap Help",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Navigation",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from("  j/↓     Move down"),
        Line::from("  k/↑     Move up"),
        Line::from("  g       Go to top"),
        Line::from("  G       Go to bottom"),
        Line::from("  J/K     Scroll details"),
        Line::from(""),
        Line::from(Span::styled(
            "Views",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from("  e       Toggle endpoint registry"),
        Line::from(""),
        Line::from(Span::styled(
            "Actions",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from("  ?       Toggle help"),
        Line::from("  q       Quit"),
    ];

    let paragraph = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(" Help ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().bg(Color::Black));

    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();

    spans.push(Span::styled("j/k", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Nav  "));

    spans.push(Span::styled("g/G", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Top/Bottom  "));

    spans.push(Span::styled("e", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(match app.view_mode {
        ViewMode::Records => " Endpoints  ",
        ViewMode::Endpoints => " Records  ",
    }));

    spans.push(Span::styled("?", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Help  "));

    spans.push(Span::styled("q", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Quit"));

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));

    frame.render_widget(paragraph, area);
}
