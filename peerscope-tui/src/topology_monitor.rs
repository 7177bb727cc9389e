use anyhow::Result;
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use peerscope_client::{RefreshTrigger, TopologyUpdate};
use peerscope_core::{GraphModel, LowPeerNode, TopologySummary, find_low_peers};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use std::cell::Cell;
use std::io;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// TUI state for the live topology view. Always shows the newest good
/// snapshot; failed fetches are logged without clearing it.
pub struct TopologyMonitor {
    control: String,
    min_peers: usize,
    model: Option<GraphModel>,
    summary: Option<TopologySummary>,
    peer_counts: Vec<LowPeerNode>,
    sequence: u64,
    last_update: Option<DateTime<Local>>,
    last_error: Option<String>,
    logs: Vec<(LogLevel, String)>,
    selected_node: Option<usize>,
    scroll_nodes: usize,
    // rows visible in the nodes panel at the last draw
    nodes_height: Cell<usize>,
    scroll_edges: usize,
    rx: mpsc::UnboundedReceiver<TopologyUpdate>,
}

impl TopologyMonitor {
    pub fn new(
        rx: mpsc::UnboundedReceiver<TopologyUpdate>,
        control: impl Into<String>,
        min_peers: usize,
    ) -> Self {
        Self {
            control: control.into(),
            min_peers,
            model: None,
            summary: None,
            peer_counts: Vec::new(),
            sequence: 0,
            last_update: None,
            last_error: None,
            logs: Vec::new(),
            selected_node: None,
            scroll_nodes: 0,
            nodes_height: Cell::new(0),
            scroll_edges: 0,
            rx,
        }
    }

    pub fn model(&self) -> Option<&GraphModel> {
        self.model.as_ref()
    }

    /// Sequence number of the snapshot on screen, 0 before the first one.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn logs(&self) -> &[(LogLevel, String)] {
        &self.logs
    }

    fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.logs.push((level, message.into()));

        // Keep only last 500 log entries
        if self.logs.len() > 500 {
            self.logs.drain(0..self.logs.len() - 500);
        }
    }

    /// Drain pending updates without blocking
    pub fn process_updates(&mut self) {
        while let Ok(update) = self.rx.try_recv() {
            self.apply(update);
        }
    }

    pub fn apply(&mut self, update: TopologyUpdate) {
        match update {
            TopologyUpdate::Snapshot {
                sequence,
                model,
                fetched_at,
            } => {
                if sequence <= self.sequence {
                    return;
                }

                let summary = TopologySummary::from_model(&model, self.min_peers);
                self.log(
                    LogLevel::Info,
                    format!(
                        "Snapshot #{}: {} nodes, {} edges",
                        sequence,
                        model.node_count(),
                        model.edge_count()
                    ),
                );
                if summary.is_partitioned() {
                    self.log(
                        LogLevel::Warn,
                        format!("Network is split into {} clusters", summary.clusters.len()),
                    );
                }

                self.peer_counts = find_low_peers(&model, usize::MAX);
                if let Some(selected) = self.selected_node
                    && selected >= self.peer_counts.len()
                {
                    self.selected_node = self.peer_counts.len().checked_sub(1);
                }
                self.follow_selection();

                self.model = Some(model);
                self.summary = Some(summary);
                self.sequence = sequence;
                self.last_update = Some(fetched_at);
                self.last_error = None;
            }
            TopologyUpdate::FetchFailed { sequence, error } => {
                if sequence <= self.sequence {
                    return;
                }
                let message = if self.model.is_some() {
                    format!(
                        "Fetch #{} failed: {} (keeping snapshot #{})",
                        sequence, error, self.sequence
                    )
                } else {
                    format!("Fetch #{} failed: {}", sequence, error)
                };
                self.log(LogLevel::Error, message);
                self.last_error = Some(error);
            }
        }
    }

    pub fn draw(&self, f: &mut Frame) {
        let size = f.area();

        // Split vertically: main area + hints bar
        let vertical_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(10), Constraint::Length(1)])
            .split(size);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(35), // Nodes
                Constraint::Percentage(35), // Edges
                Constraint::Percentage(30), // Summary + Logs
            ])
            .split(vertical_chunks[0]);

        let right_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(11), Constraint::Min(5)])
            .split(main_chunks[2]);

        self.render_nodes(f, main_chunks[0]);
        self.render_edges(f, main_chunks[1]);
        self.render_summary(f, right_chunks[0]);
        self.render_logs(f, right_chunks[1]);
        self.render_hints(f, vertical_chunks[1]);
    }

    fn render_nodes(&self, f: &mut Frame, area: Rect) {
        let title = format!(" Nodes ({}) ", self.peer_counts.len());
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Cyan));

        let inner = block.inner(area);
        f.render_widget(block, area);

        if self.model.is_none() {
            let waiting = Paragraph::new("Waiting for the first snapshot...")
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true });
            f.render_widget(waiting, inner);
            return;
        }

        let height = inner.height as usize;
        self.nodes_height.set(height);

        // Keep selection in view after a resize
        let scroll_offset = match self.selected_node {
            Some(selected) if selected < self.scroll_nodes => selected,
            Some(selected) if selected >= self.scroll_nodes + height => {
                selected.saturating_sub(height.saturating_sub(1))
            }
            _ => self.scroll_nodes,
        };

        let items: Vec<ListItem> = self
            .peer_counts
            .iter()
            .enumerate()
            .skip(scroll_offset)
            .take(height)
            .map(|(idx, node)| {
                let low = node.peers < self.min_peers;
                let count_style = if low {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default().fg(Color::Green)
                };
                let mut line = Line::from(vec![
                    Span::styled(format!("{:>3} ", node.peers), count_style),
                    Span::raw(node.id.clone()),
                ]);
                if Some(idx) == self.selected_node {
                    line = line.style(Style::default().add_modifier(Modifier::REVERSED));
                }
                ListItem::new(line)
            })
            .collect();

        f.render_widget(List::new(items), inner);
    }

    fn render_edges(&self, f: &mut Frame, area: Rect) {
        let edge_count = self.model.as_ref().map_or(0, GraphModel::edge_count);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" Edges ({}) ", edge_count))
            .border_style(Style::default().fg(Color::Blue));

        let inner = block.inner(area);
        f.render_widget(block, area);

        let Some(model) = self.model.as_ref() else {
            return;
        };

        let height = inner.height as usize;
        let scroll_offset = self.scroll_edges.min(edge_count.saturating_sub(height));

        let items: Vec<ListItem> = model
            .edges()
            .skip(scroll_offset)
            .take(height)
            .map(|edge| {
                let to_style = if model.contains_node(&edge.to) {
                    Style::default()
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                ListItem::new(Line::from(vec![
                    Span::raw(edge.from.clone()),
                    Span::styled(" → ", Style::default().fg(Color::DarkGray)),
                    Span::styled(edge.to.clone(), to_style),
                ]))
            })
            .collect();

        f.render_widget(List::new(items), inner);
    }

    fn render_summary(&self, f: &mut Frame, area: Rect) {
        let (title, border_color) = match (&self.summary, &self.last_error) {
            (_, Some(_)) => (" Stale ", Color::Red),
            (Some(summary), None) if summary.is_partitioned() => (" Partitioned ", Color::Yellow),
            (Some(_), None) => (" Connected ", Color::Green),
            (None, None) => (" Connecting ", Color::Yellow),
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(border_color));

        let inner = block.inner(area);
        f.render_widget(block, area);

        let label = Style::default().fg(Color::DarkGray);
        let value = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

        let mut text = vec![Line::from(vec![
            Span::styled("Control:  ", label),
            Span::styled(self.control.clone(), Style::default().fg(Color::Cyan)),
        ])];

        if let Some(ref summary) = self.summary {
            let updated = self
                .last_update
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_default();
            text.push(Line::from(vec![
                Span::styled("Snapshot: ", label),
                Span::styled(format!("#{} at {}", self.sequence, updated), value),
            ]));
            text.push(Line::from(vec![
                Span::styled("Nodes:    ", label),
                Span::styled(summary.node_count.to_string(), value),
            ]));
            text.push(Line::from(vec![
                Span::styled("Edges:    ", label),
                Span::styled(summary.edge_count.to_string(), value),
            ]));
            text.push(Line::from(vec![
                Span::styled("Clusters: ", label),
                Span::styled(summary.clusters.len().to_string(), value),
            ]));
            text.push(Line::from(vec![
                Span::styled("Low peer: ", label),
                Span::styled(
                    format!("{} (< {})", summary.low_peers.len(), summary.min_peers),
                    value,
                ),
            ]));
        }

        if let Some(ref error) = self.last_error {
            text.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        }

        let paragraph = Paragraph::new(text).wrap(Wrap { trim: true });
        f.render_widget(paragraph, inner);
    }

    fn render_logs(&self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Logs ")
            .border_style(Style::default().fg(Color::Magenta));

        let inner = block.inner(area);
        f.render_widget(block, area);

        let height = inner.height as usize;

        // Always follow the tail
        let items: Vec<ListItem> = self
            .logs
            .iter()
            .skip(self.logs.len().saturating_sub(height))
            .map(|(level, message)| {
                let (prefix, style) = match level {
                    LogLevel::Info => ("INFO ", Style::default().fg(Color::Blue)),
                    LogLevel::Warn => ("WARN ", Style::default().fg(Color::Yellow)),
                    LogLevel::Error => ("ERROR", Style::default().fg(Color::Red)),
                };
                ListItem::new(format!("[{}] {}", prefix, message)).style(style)
            })
            .collect();

        f.render_widget(List::new(items), inner);
    }

    fn render_hints(&self, f: &mut Frame, area: Rect) {
        let key = Style::default().fg(Color::Black).bg(Color::Gray);
        let hints = Line::from(vec![
            Span::styled(" q/ESC ", key),
            Span::raw(" Exit  "),
            Span::styled(" r ", key),
            Span::raw(" Refresh  "),
            Span::styled(" ↑/↓ ", key),
            Span::raw(" Select  "),
            Span::styled(" PgUp/PgDn ", key),
            Span::raw(" Scroll edges  "),
            Span::styled(" Home/End ", key),
            Span::raw(" Top/Bottom"),
        ]);

        let paragraph =
            Paragraph::new(hints).style(Style::default().bg(Color::Black).fg(Color::Gray));
        f.render_widget(paragraph, area);
    }

    fn select_previous(&mut self) {
        if self.peer_counts.is_empty() {
            return;
        }
        let selected = match self.selected_node {
            Some(selected) => selected.saturating_sub(1),
            None => self.peer_counts.len() - 1,
        };
        self.selected_node = Some(selected);
        self.follow_selection();
    }

    fn select_next(&mut self) {
        if self.peer_counts.is_empty() {
            return;
        }
        let selected = match self.selected_node {
            Some(selected) => (selected + 1).min(self.peer_counts.len() - 1),
            None => self.scroll_nodes,
        };
        self.selected_node = Some(selected);
        self.follow_selection();
    }

    /// Scroll the nodes panel just enough to keep the selected row visible.
    fn follow_selection(&mut self) {
        let Some(selected) = self.selected_node else {
            return;
        };
        let height = self.nodes_height.get();
        if selected < self.scroll_nodes {
            self.scroll_nodes = selected;
        } else if height > 0 && selected >= self.scroll_nodes + height {
            self.scroll_nodes = selected + 1 - height;
        }
    }
}

/// Run the topology monitor (blocking, run it off the async runtime)
pub fn run_monitor(
    rx: mpsc::UnboundedReceiver<TopologyUpdate>,
    trigger: RefreshTrigger,
    control: String,
    min_peers: usize,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut monitor = TopologyMonitor::new(rx, control, min_peers);

    let result = monitor_loop(&mut terminal, &mut monitor, &trigger);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn monitor_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    monitor: &mut TopologyMonitor,
    trigger: &RefreshTrigger,
) -> Result<()> {
    loop {
        monitor.process_updates();

        terminal.draw(|f| monitor.draw(f))?;

        // Poll for keyboard events (non-blocking with timeout)
        if event::poll(std::time::Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Char('r') => {
                    if trigger.refresh() {
                        monitor.log(LogLevel::Info, "Refresh requested");
                    } else {
                        monitor.log(LogLevel::Error, "Poller is not running");
                    }
                }
                KeyCode::Up => monitor.select_previous(),
                KeyCode::Down => monitor.select_next(),
                KeyCode::PageUp => {
                    monitor.scroll_edges = monitor.scroll_edges.saturating_sub(10);
                }
                KeyCode::PageDown => {
                    let edges = monitor.model.as_ref().map_or(0, GraphModel::edge_count);
                    monitor.scroll_edges = (monitor.scroll_edges + 10).min(edges.saturating_sub(1));
                }
                KeyCode::Home => {
                    monitor.scroll_nodes = 0;
                    monitor.scroll_edges = 0;
                    if !monitor.peer_counts.is_empty() {
                        monitor.selected_node = Some(0);
                    }
                }
                KeyCode::End => {
                    if !monitor.peer_counts.is_empty() {
                        monitor.selected_node = Some(monitor.peer_counts.len() - 1);
                        monitor.follow_selection();
                    }
                }
                _ => {}
            }
        }
    }

    Ok(())
}
