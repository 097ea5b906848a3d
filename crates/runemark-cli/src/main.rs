use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{info, warn};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use relative_path::RelativePathBuf;
use runemark_config::Config;
use runemark_engine::io;
use runemark_engine::marks::{
    BlockId, BlockStore, DocumentSelection, MarkPolicy, MarkRequest, MarkSession, PLACEHOLDER,
    PayloadValue, RenderKind, RunSequence, Selection, Tag, TagSet, Transaction, highlighted_tags,
};
use std::{env, io::stdout, path::PathBuf, process};

struct BlockEntry {
    path: RelativePathBuf,
    id: BlockId,
}

struct App {
    blocks_path: PathBuf,
    entries: Vec<BlockEntry>,
    file_list_state: ListState,
    session: MarkSession<Vec<Transaction>>,
    /// Caret as a block-level character offset
    cursor: usize,
    /// Other end of the selection while extending with shift
    anchor: Option<usize>,
    status: String,
}

impl App {
    /// Loads every block up front so parse warnings land on stderr before
    /// the terminal switches to the alternate screen
    fn new(blocks_path: PathBuf, policy: MarkPolicy) -> Result<Self> {
        let mut store = BlockStore::new();
        let mut entries = Vec::new();
        for path in io::scan_block_files(&blocks_path)? {
            match io::read_block(&path, &blocks_path) {
                Ok(block) => {
                    let id = block.block_id().clone();
                    if store.insert(block).is_some() {
                        warn!("Block {id} is defined more than once; using {path}");
                    }
                    entries.push(BlockEntry { path, id });
                }
                Err(e) => warn!("Skipping {path}: {e}"),
            }
        }
        info!(
            "Loaded {} blocks from {}",
            entries.len(),
            blocks_path.display()
        );

        let mut app = Self {
            blocks_path,
            entries,
            file_list_state: ListState::default(),
            session: MarkSession::new(store, policy, Vec::new()),
            cursor: 0,
            anchor: None,
            status: String::new(),
        };
        if !app.entries.is_empty() {
            app.file_list_state.select(Some(0));
        }
        Ok(app)
    }

    fn current_entry(&self) -> Option<&BlockEntry> {
        self.entries.get(self.file_list_state.selected()?)
    }

    fn current_block(&self) -> Option<&RunSequence> {
        self.session.store().get(&self.current_entry()?.id)
    }

    fn select_file(&mut self, index: usize) {
        self.file_list_state.select(Some(index));
        self.cursor = 0;
        self.anchor = None;
        self.status.clear();
    }

    fn next_file(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = match self.file_list_state.selected() {
            Some(i) => (i + 1) % self.entries.len(),
            None => 0,
        };
        self.select_file(i);
    }

    fn previous_file(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = match self.file_list_state.selected() {
            Some(0) | None => self.entries.len() - 1,
            Some(i) => i - 1,
        };
        self.select_file(i);
    }

    fn move_cursor(&mut self, forward: bool, extend: bool) {
        let Some(block) = self.current_block() else {
            return;
        };
        let chars: Vec<char> = block.text().chars().collect();
        let next = step(&chars, self.cursor, forward);
        if extend {
            self.anchor.get_or_insert(self.cursor);
        } else {
            self.anchor = None;
        }
        self.cursor = next;
    }

    fn move_to_edge(&mut self, end: bool) {
        let Some(block) = self.current_block() else {
            return;
        };
        self.cursor = if end { block.char_len() } else { 0 };
        self.anchor = None;
    }

    /// Selection as block offsets, start first
    fn range(&self) -> (usize, usize) {
        let anchor = self.anchor.unwrap_or(self.cursor);
        (anchor.min(self.cursor), anchor.max(self.cursor))
    }

    fn selection(&self, block: &RunSequence) -> Selection {
        let anchor = self.anchor.unwrap_or(self.cursor);
        Selection::from_block_offsets(block, anchor, self.cursor)
    }

    fn apply(&mut self, request: MarkRequest) {
        let Some(id) = self.current_entry().map(|entry| entry.id.clone()) else {
            return;
        };
        let Some(block) = self.session.store().get(&id) else {
            return;
        };
        let selection = DocumentSelection::within(id.clone(), self.selection(block));

        match self.session.apply(&selection, &request) {
            Ok(outcome) => {
                if let Some(reason) = &outcome.skipped {
                    self.status = format!("No change: {reason}");
                    return;
                }
                self.status = match outcome.render.map(|render| render.kind) {
                    Some(RenderKind::LinkMenu) => "Link added; set its target".to_string(),
                    Some(RenderKind::MemoEditor) => "Memo added; write its content".to_string(),
                    Some(RenderKind::MathEditor) => "Formula added; write its source".to_string(),
                    None => format!("{:?}", request.mode),
                };
                if let Some(block) = self.session.store().get(&id)
                    && let Ok((start, end)) = outcome.selection.block_offsets(block)
                {
                    self.anchor = (start != end).then_some(start);
                    self.cursor = end;
                }
            }
            Err(reason) => self.status = format!("No change: {reason}"),
        }
    }

    fn save(&mut self) {
        let Some(entry) = self.current_entry() else {
            return;
        };
        let Some(block) = self.session.store().get(&entry.id) else {
            return;
        };
        self.status = match io::write_block(&entry.path, &self.blocks_path, block) {
            Ok(()) => format!("Saved {}", entry.path),
            Err(e) => format!("Error saving {}: {e}", entry.path),
        };
    }
}

/// Move one visible character, hopping over placeholders
fn step(chars: &[char], from: usize, forward: bool) -> usize {
    let mut pos = from.min(chars.len());
    loop {
        let crossed = if forward {
            if pos == chars.len() {
                return pos;
            }
            pos += 1;
            chars[pos - 1]
        } else {
            if pos == 0 {
                return pos;
            }
            pos -= 1;
            chars[pos]
        };
        if crossed != PLACEHOLDER {
            return pos;
        }
    }
}

fn tag_style(style: Style, tag: Tag) -> Style {
    match tag {
        Tag::Strong => style.add_modifier(Modifier::BOLD),
        Tag::Em => style.add_modifier(Modifier::ITALIC),
        Tag::Underline => style.add_modifier(Modifier::UNDERLINED),
        Tag::Strike => style.add_modifier(Modifier::CROSSED_OUT),
        Tag::Highlight => style.bg(Color::Yellow).fg(Color::Black),
        Tag::Code | Tag::Kbd => style.fg(Color::LightRed),
        Tag::Superscript | Tag::Subscript => style.add_modifier(Modifier::DIM),
        Tag::Link => style.fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
        Tag::BlockRef | Tag::VirtualBlockRef | Tag::FileAnnotationRef => style.fg(Color::Cyan),
        Tag::InlineMath => style.fg(Color::Magenta),
        Tag::InlineMemo => style.fg(Color::Green),
        Tag::Hashtag => style.fg(Color::LightBlue),
        Tag::SearchMark => style.bg(Color::LightYellow).fg(Color::Black),
        Tag::Text | Tag::Backslash => style,
    }
}

fn run_style(tags: TagSet) -> Style {
    tags.iter().fold(Style::default(), tag_style)
}

fn push_char(line: &mut Line<'static>, c: char, style: Style) {
    match line.spans.last_mut() {
        Some(span) if span.style == style => span.content.to_mut().push(c),
        _ => line.spans.push(Span::styled(c.to_string(), style)),
    }
}

/// Styled lines of a block with the selection reversed and the caret shaded
fn block_lines(block: &RunSequence, range: (usize, usize), cursor: usize) -> Vec<Line<'static>> {
    let caret = Style::default().bg(Color::DarkGray);
    let (start, end) = range;
    let mut lines = vec![Line::default()];
    let mut caret_shown = start != end;
    let mut offset = 0;

    for run in block.runs() {
        let base = run_style(run.tags());
        for c in run.text().chars() {
            let here = offset;
            offset += 1;
            if c == PLACEHOLDER {
                continue;
            }
            let mut style = base;
            if !caret_shown && here >= cursor {
                caret_shown = true;
                if c == '\n' {
                    if let Some(line) = lines.last_mut() {
                        push_char(line, ' ', caret);
                    }
                } else {
                    style = style.bg(Color::DarkGray);
                }
            }
            if c == '\n' {
                lines.push(Line::default());
                continue;
            }
            if (start..end).contains(&here) {
                style = style.add_modifier(Modifier::REVERSED);
            }
            if let Some(line) = lines.last_mut() {
                push_char(line, c, style);
            }
        }
    }
    if !caret_shown && let Some(line) = lines.last_mut() {
        push_char(line, ' ', caret);
    }
    lines
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // Determine blocks path from CLI args or config file
    let args: Vec<String> = env::args().collect();
    let config_path = Config::config_path();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            eprintln!("Usage: {} [blocks-folder-path]", args[0]);
            process::exit(1);
        }
    };

    let (blocks_path, from_config) = match (args.len(), &config) {
        (2, _) => (PathBuf::from(&args[1]), false),
        (1, Some(config)) => (config.blocks_path.clone(), true),
        (1, None) => {
            eprintln!("Error: No blocks path provided and no config file found");
            eprintln!("Usage: {} <blocks-folder-path>", args[0]);
            eprintln!("Or create a config file at {}", config_path.display());
            process::exit(1);
        }
        _ => {
            eprintln!("Usage: {} [blocks-folder-path]", args[0]);
            process::exit(1);
        }
    };
    let policy = config.map(|config| config.marks).unwrap_or_default();

    if let Err(e) = io::validate_blocks_dir(&blocks_path) {
        let source = if from_config {
            format!(" from config file '{}'", config_path.display())
        } else {
            String::new()
        };
        eprintln!(
            "Error: Blocks path '{}'{} is invalid: {e}",
            blocks_path.display(),
            source
        );
        process::exit(1);
    }

    let mut app = App::new(blocks_path, policy)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }
    info!(
        "{} transactions recorded",
        app.session.sink().len()
    );

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            let extend = key.modifiers.contains(KeyModifiers::SHIFT);
            match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.next_file(),
                KeyCode::Up | KeyCode::Char('k') => app.previous_file(),
                KeyCode::Right => app.move_cursor(true, extend),
                KeyCode::Left => app.move_cursor(false, extend),
                KeyCode::Home => app.move_to_edge(false),
                KeyCode::End => app.move_to_edge(true),
                KeyCode::Char('w') => app.save(),
                KeyCode::Char('x') => app.apply(MarkRequest::clear()),
                KeyCode::Char('X') => app.apply(MarkRequest::clear_font_style()),
                KeyCode::Char('l') => app.apply(MarkRequest::toggle(Tag::Link)),
                KeyCode::Char('m') => app.apply(
                    MarkRequest::add(Tag::InlineMemo).with_payload(PayloadValue::memo("")),
                ),
                KeyCode::Char(c) => {
                    if let Some(tag) = toggle_key(c) {
                        app.apply(MarkRequest::toggle(tag));
                    }
                }
                _ => {}
            }
        }
    }
}

fn toggle_key(c: char) -> Option<Tag> {
    let tag = match c {
        'b' => Tag::Strong,
        'i' => Tag::Em,
        'u' => Tag::Underline,
        's' => Tag::Strike,
        'c' => Tag::Code,
        'h' => Tag::Highlight,
        'K' => Tag::Kbd,
        't' => Tag::Hashtag,
        '^' => Tag::Superscript,
        '_' => Tag::Subscript,
        'e' => Tag::InlineMath,
        _ => return None,
    };
    Some(tag)
}

fn ui(f: &mut Frame, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.area());
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .margin(1)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)].as_ref())
        .split(rows[0]);

    // Block file list
    let file_items: Vec<ListItem> = app
        .entries
        .iter()
        .map(|entry| ListItem::new(Line::from(vec![Span::raw(entry.path.to_string())])))
        .collect();

    let files_list = List::new(file_items)
        .block(Block::default().borders(Borders::ALL).title("Blocks"))
        .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black));

    f.render_stateful_widget(files_list, chunks[0], &mut app.file_list_state);

    // Block content with its toolbar state underneath
    let panel = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(chunks[1]);

    let (title, content_text, toolbar) = match app.current_block() {
        Some(block) => {
            let active = highlighted_tags(block, app.selection(block));
            let toolbar = format!(
                "Active: {} | Transactions: {}",
                if active.is_empty() {
                    "-".to_string()
                } else {
                    active.data_type()
                },
                app.session.sink().len()
            );
            let title = app
                .current_entry()
                .map(|entry| entry.path.to_string())
                .unwrap_or_default();
            (title, block_lines(block, app.range(), app.cursor), toolbar)
        }
        None => (
            "Content".to_string(),
            vec![Line::from("Select a block to view its content")],
            String::new(),
        ),
    };

    let content = Paragraph::new(content_text)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    f.render_widget(content, panel[0]);

    let status = Paragraph::new(vec![Line::from(toolbar), Line::from(app.status.clone())])
        .block(Block::default());
    f.render_widget(status, panel[1]);

    let help_text = Line::from(vec![
        Span::raw("q: Quit | ↑↓/jk: Block | ←→: Move (shift selects) | "),
        Span::raw("b i u s c h K t ^ _ e: Toggle | l: Link | m: Memo | "),
        Span::raw("x/X: Clear | w: Save"),
    ]);

    f.render_widget(Paragraph::new(vec![help_text]), rows[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use runemark_engine::marks::Run;

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn test_step_hops_over_placeholders() {
        let chars: Vec<char> = "a\u{200b}\u{200b}b".chars().collect();
        assert_eq!(step(&chars, 1, true), 4);
        assert_eq!(step(&chars, 4, false), 3);
        assert_eq!(step(&chars, 3, false), 0);
        assert_eq!(step(&chars, 4, true), 4);
    }

    #[test]
    fn test_block_lines_split_on_newlines_and_hide_placeholders() {
        let block = RunSequence::from_runs(
            BlockId::new("b"),
            vec![
                Run::plain("one\n"),
                Run::new("\u{200b}two", [Tag::Code]),
            ],
        );
        let lines = block_lines(&block, (0, 0), 99);
        assert_eq!(lines.len(), 2);
        assert_eq!(text_of(&lines[0]), "one");
        assert_eq!(text_of(&lines[1]), "two ");
    }

    #[test]
    fn test_selection_is_reversed() {
        let block = RunSequence::from_runs(BlockId::new("b"), vec![Run::plain("abcd")]);
        let lines = block_lines(&block, (1, 3), 3);
        let reversed: String = lines[0]
            .spans
            .iter()
            .filter(|span| span.style.add_modifier.contains(Modifier::REVERSED))
            .map(|span| span.content.as_ref())
            .collect();
        assert_eq!(reversed, "bc");
    }

    #[test]
    fn test_run_style_combines_tags() {
        let style = run_style(TagSet::from([Tag::Strong, Tag::Em]));
        assert!(style.add_modifier.contains(Modifier::BOLD | Modifier::ITALIC));
    }

    #[test]
    fn test_toggle_keys() {
        assert_eq!(toggle_key('b'), Some(Tag::Strong));
        assert_eq!(toggle_key('_'), Some(Tag::Subscript));
        assert_eq!(toggle_key('z'), None);
    }
}
