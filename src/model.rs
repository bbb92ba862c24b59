use std::time::Instant;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, trace};

use crate::domain::{AppConfig, HELP_TEXT, InputMode, Message, TabError};
use crate::inputter::{InputResult, Inputter};
use crate::table::{Table, Value};
use crate::view::{self, Coercion, Page, Sort, ViewState};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

/// Snapshot of everything the renderer needs for one frame. Rebuilt by the
/// model after every transition; the ui never reaches into the model or the
/// table directly.
#[derive(Debug, Clone)]
pub struct UiData {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub total_matching: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub sort: Option<Sort>,
    pub active_column: usize,
    pub selected_row: usize,
    pub filter_column: String,
    pub search_query: String,
    pub cmdinput: InputResult,
    pub input_mode: Option<InputMode>,
    pub show_popup: bool,
    pub popup_message: String,
    pub status_message: String,
    pub last_update: Instant,
}

impl UiData {
    pub fn empty() -> Self {
        UiData {
            name: String::new(),
            columns: Vec::new(),
            rows: Vec::new(),
            total_matching: 0,
            current_page: 1,
            total_pages: 1,
            sort: None,
            active_column: 0,
            selected_row: 0,
            filter_column: String::new(),
            search_query: String::new(),
            cmdinput: InputResult::default(),
            input_mode: None,
            show_popup: false,
            popup_message: String::new(),
            status_message: String::new(),
            last_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: AppConfig,
    pub status: Status,
    table: Table,
    state: ViewState,
    // Stage caches: `filtered` is keyed by the filter facet, `sorted` by
    // `filtered` plus the sort facet. Page moves re-run pagination only,
    // sort activation re-sorts the cached filter output, and query edits
    // recompute the lot.
    filtered: Vec<usize>,
    sorted: Vec<usize>,
    page: Page,
    coercion: Coercion,
    active_column: usize,
    selected_row: usize,
    input: Inputter,
    input_mode: Option<InputMode>,
    saved_query: String,
    show_popup: bool,
    uidata: UiData,
    status_message: String,
}

impl Model {
    pub fn init(config: &AppConfig, table: Table) -> Self {
        let state = ViewState::for_table(&table, config.filter_column.as_deref());
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            state,
            filtered: Vec::new(),
            sorted: Vec::new(),
            page: Page::default(),
            coercion: if config.plain_sort {
                Coercion::Plain
            } else {
                Coercion::Rich
            },
            active_column: 0,
            selected_row: 0,
            input: Inputter::default(),
            input_mode: None,
            saved_query: String::new(),
            show_popup: false,
            uidata: UiData::empty(),
            status_message: String::new(),
            table,
        };
        model.refresh_filtered();
        model.set_status_message(format!(
            "Loaded {} rows from {}",
            model.table.len(),
            model.table.name()
        ));
        model
    }

    pub fn get_uidata(&self) -> &UiData {
        &self.uidata
    }

    /// While a prompt is open the controller hands keys through unmapped.
    pub fn raw_keyevents(&self) -> bool {
        self.input_mode.is_some()
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Message) -> Result<(), TabError> {
        trace!("Update: {:?}", message);
        if self.show_popup {
            match message {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help => self.close_popup(),
                _ => (),
            }
            return Ok(());
        }
        match message {
            Message::Quit => self.quit(),
            Message::RawKey(key) => self.raw_input(key),
            Message::MoveColumnLeft => self.move_column_left(),
            Message::MoveColumnRight => self.move_column_right(),
            Message::MoveRowUp => self.move_row_up(),
            Message::MoveRowDown => self.move_row_down(),
            Message::ActivateColumn => self.activate_column(),
            Message::CycleFilterColumn => self.cycle_filter_column(),
            Message::PrevPage => self.prev_page(),
            Message::NextPage => self.next_page(),
            Message::Search => self.enter_input_mode(InputMode::Search),
            Message::JumpToPage => self.enter_input_mode(InputMode::PageJump),
            Message::CopyCell => self.copy_cell(),
            Message::CopyRow => self.copy_row(),
            Message::Help => self.show_help(),
            Message::Exit => (),
        }
        Ok(())
    }

    // ---------------------- Derived-view refresh chain --------------------- //

    fn refresh_filtered(&mut self) {
        let start = Instant::now();
        self.filtered =
            view::filter_rows(&self.table, &self.state.filter_column, &self.state.search_query);
        debug!(
            "Filter \"{}\" on \"{}\" kept {}/{} rows in {}ms",
            self.state.search_query,
            self.state.filter_column,
            self.filtered.len(),
            self.table.len(),
            start.elapsed().as_millis()
        );
        self.refresh_sorted();
    }

    fn refresh_sorted(&mut self) {
        let start = Instant::now();
        self.sorted = view::sort_rows(
            &self.table,
            self.filtered.clone(),
            self.state.sort.as_ref(),
            self.coercion,
        );
        debug!(
            "Sorting {} rows took {}ms",
            self.sorted.len(),
            start.elapsed().as_millis()
        );
        self.refresh_page();
    }

    fn refresh_page(&mut self) {
        self.page = view::paginate(self.sorted.len(), self.state.current_page, self.config.page_size);
        // Write the clamped page back so the state never holds an
        // out-of-range page.
        self.state.current_page = self.page.current_page;
        let visible = self.page.end - self.page.start;
        self.selected_row = self.selected_row.min(visible.saturating_sub(1));
        self.refresh_uidata();
    }

    fn refresh_uidata(&mut self) {
        let rows = self.sorted[self.page.start..self.page.end]
            .iter()
            .map(|&row| self.table.row(row).to_vec())
            .collect();
        self.uidata = UiData {
            name: self.table.name().to_string(),
            columns: self.table.columns().to_vec(),
            rows,
            total_matching: self.filtered.len(),
            current_page: self.page.current_page,
            total_pages: self.page.total_pages,
            sort: self.state.sort.clone(),
            active_column: self.active_column,
            selected_row: self.selected_row,
            filter_column: self.state.filter_column.clone(),
            search_query: self.state.search_query.clone(),
            cmdinput: self.input.get(),
            input_mode: self.input_mode,
            show_popup: self.show_popup,
            popup_message: if self.show_popup {
                HELP_TEXT.to_string()
            } else {
                String::new()
            },
            status_message: self.status_message.clone(),
            last_update: Instant::now(),
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_update = Instant::now();
    }

    // -------------------- Control handling functions ---------------------- //

    fn move_column_left(&mut self) {
        self.active_column = self.active_column.saturating_sub(1);
        self.refresh_uidata();
    }

    fn move_column_right(&mut self) {
        let columns = self.table.columns().len();
        if columns > 0 && self.active_column < columns - 1 {
            self.active_column += 1;
        }
        self.refresh_uidata();
    }

    fn move_row_up(&mut self) {
        self.selected_row = self.selected_row.saturating_sub(1);
        self.refresh_uidata();
    }

    fn move_row_down(&mut self) {
        let visible = self.page.end - self.page.start;
        if visible > 0 && self.selected_row < visible - 1 {
            self.selected_row += 1;
        }
        self.refresh_uidata();
    }

    fn activate_column(&mut self) {
        let Some(column) = self.table.columns().get(self.active_column).cloned() else {
            return;
        };
        self.state.activate_column(&column);
        // The filter cache stays valid; only sort and pagination re-run.
        self.refresh_sorted();
        if let Some(sort) = &self.state.sort {
            let direction = sort.direction.as_str();
            self.set_status_message(format!("Sorted by {column} ({direction})"));
        }
    }

    fn cycle_filter_column(&mut self) {
        let columns = self.table.columns();
        if columns.is_empty() {
            return;
        }
        let next = self
            .table
            .column_index(&self.state.filter_column)
            .map(|idx| (idx + 1) % columns.len())
            .unwrap_or(0);
        let column = columns[next].clone();
        self.state.set_filter_column(column.clone());
        self.refresh_filtered();
        self.set_status_message(format!("Filtering on {column}"));
    }

    fn prev_page(&mut self) {
        self.state.prev_page();
        self.refresh_page();
    }

    fn next_page(&mut self) {
        self.state.next_page(self.page.total_pages);
        self.refresh_page();
    }

    fn enter_input_mode(&mut self, mode: InputMode) {
        self.input_mode = Some(mode);
        self.input.clear();
        if mode == InputMode::Search {
            self.saved_query = self.state.search_query.clone();
            self.input.set(&self.state.search_query);
        }
        self.refresh_uidata();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        let Some(mode) = self.input_mode else {
            return;
        };
        let result = self.input.read(key);
        match mode {
            InputMode::Search => self.handle_search_input(result),
            InputMode::PageJump => self.handle_page_input(result),
        }
    }

    fn handle_search_input(&mut self, result: InputResult) {
        if result.canceled {
            self.input_mode = None;
            let saved = self.saved_query.clone();
            self.state.set_search_query(saved);
            self.refresh_filtered();
        } else if result.finished {
            self.input_mode = None;
            self.refresh_uidata();
            self.set_status_message(format!("{} rows match", self.filtered.len()));
        } else {
            // Live search: every keystroke narrows the view and lands the
            // page back on 1.
            self.state.set_search_query(result.input);
            self.refresh_filtered();
        }
    }

    fn handle_page_input(&mut self, result: InputResult) {
        if result.canceled {
            self.input_mode = None;
            self.refresh_uidata();
        } else if result.finished {
            self.input_mode = None;
            match result.input.trim().parse::<usize>() {
                Ok(page) => {
                    self.state.jump_to_page(page, self.page.total_pages);
                    self.refresh_page();
                }
                Err(_) => {
                    self.refresh_uidata();
                    self.set_status_message(format!("Not a page number: {}", result.input));
                }
            }
        } else {
            self.refresh_uidata();
        }
    }

    fn show_help(&mut self) {
        self.show_popup = true;
        self.refresh_uidata();
    }

    fn close_popup(&mut self) {
        self.show_popup = false;
        self.refresh_uidata();
    }

    // -------------------------- Clipboard ---------------------------------- //

    fn selected_table_row(&self) -> Option<usize> {
        self.sorted[self.page.start..self.page.end]
            .get(self.selected_row)
            .copied()
    }

    fn copy_cell(&mut self) {
        let Some(row) = self.selected_table_row() else {
            self.set_status_message("Nothing selected");
            return;
        };
        if self.active_column >= self.table.columns().len() {
            return;
        }
        let cell = self.table.value(row, self.active_column).to_string();
        self.copy_to_clipboard(cell, "cell");
    }

    fn copy_row(&mut self) {
        let Some(row) = self.selected_table_row() else {
            self.set_status_message("Nothing selected");
            return;
        };
        let content = self
            .table
            .row(row)
            .iter()
            .map(|value| Self::wrap_cell_content(&value.to_string()))
            .collect::<Vec<String>>();
        self.copy_to_clipboard(content.join(","), "row");
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.chars().any(|c| c == '"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace("\"", "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    // The clipboard handle is created per copy so the model never needs a
    // display connection; important for headless runs.
    fn copy_to_clipboard(&mut self, content: String, what: &str) {
        match Clipboard::new().and_then(|mut clipboard| clipboard.set_text(content)) {
            Ok(_) => self.set_status_message(format!("Copied {what} to clipboard")),
            Err(e) => {
                error!("Error copying to clipboard: {:?}", e);
                self.set_status_message("Clipboard unavailable");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::SortDirection;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn people_model() -> Model {
        let table = Table::from_json_str(
            "people",
            r#"[
                {"id": 1, "name": "Bob", "amount": 100},
                {"id": 2, "name": "ann", "amount": 50},
                {"id": 3, "name": "Ann", "amount": 50}
            ]"#,
        )
        .unwrap();
        Model::init(&AppConfig::default(), table)
    }

    fn numbers_model(n: usize) -> Model {
        let rows: Vec<String> = (0..n).map(|i| format!("{{\"i\": {i}}}")).collect();
        let table = Table::from_json_str("numbers", &format!("[{}]", rows.join(","))).unwrap();
        Model::init(&AppConfig::default(), table)
    }

    fn type_key(model: &mut Model, code: KeyCode) {
        model
            .update(Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE)))
            .unwrap();
    }

    #[test]
    fn init_shows_the_first_page() {
        let model = numbers_model(25);
        let ui = model.get_uidata();
        assert_eq!(ui.rows.len(), 10);
        assert_eq!(ui.current_page, 1);
        assert_eq!(ui.total_pages, 3);
        assert_eq!(ui.total_matching, 25);
    }

    #[test]
    fn page_navigation_clamps_at_both_ends() {
        let mut model = numbers_model(25);
        model.update(Message::PrevPage).unwrap();
        assert_eq!(model.get_uidata().current_page, 1);

        for _ in 0..5 {
            model.update(Message::NextPage).unwrap();
        }
        let ui = model.get_uidata();
        assert_eq!(ui.current_page, 3);
        assert_eq!(ui.rows.len(), 5);
    }

    #[test]
    fn page_moves_leave_filter_and_sort_untouched() {
        let mut model = numbers_model(25);
        let filtered_before = model.filtered.clone();
        let sorted_before = model.sorted.clone();
        model.update(Message::NextPage).unwrap();
        assert_eq!(model.filtered, filtered_before);
        assert_eq!(model.sorted, sorted_before);
        assert_eq!(model.state.sort, None);
    }

    #[test]
    fn activating_a_column_toggles_its_direction() {
        let mut model = people_model();
        model.update(Message::MoveColumnRight).unwrap();
        model.update(Message::ActivateColumn).unwrap();
        assert_eq!(
            model.state.sort,
            Some(Sort {
                key: "name".into(),
                direction: SortDirection::Ascending
            })
        );
        // ann, Ann, Bob -- stability keeps "ann" before "Ann".
        let names: Vec<String> = model
            .get_uidata()
            .rows
            .iter()
            .map(|row| row[1].to_string())
            .collect();
        assert_eq!(names, vec!["ann", "Ann", "Bob"]);

        model.update(Message::ActivateColumn).unwrap();
        assert_eq!(
            model.state.sort.as_ref().map(|s| s.direction),
            Some(SortDirection::Descending)
        );
    }

    #[test]
    fn live_search_filters_on_every_keystroke() {
        let mut model = people_model();
        model.update(Message::Search).unwrap();
        assert!(model.raw_keyevents());

        type_key(&mut model, KeyCode::Char('a'));
        type_key(&mut model, KeyCode::Char('n'));
        let ui = model.get_uidata();
        assert_eq!(ui.search_query, "an");
        assert_eq!(ui.total_matching, 2);
        assert_eq!(ui.current_page, 1);

        type_key(&mut model, KeyCode::Enter);
        assert!(!model.raw_keyevents());
        assert_eq!(model.get_uidata().total_matching, 2);
    }

    #[test]
    fn canceled_search_restores_the_previous_query() {
        let mut model = people_model();
        model.update(Message::Search).unwrap();
        type_key(&mut model, KeyCode::Char('b'));
        assert_eq!(model.get_uidata().total_matching, 1);

        type_key(&mut model, KeyCode::Esc);
        let ui = model.get_uidata();
        assert!(!model.raw_keyevents());
        assert_eq!(ui.search_query, "");
        assert_eq!(ui.total_matching, 3);
    }

    #[test]
    fn searching_resets_a_later_page_back_to_the_first() {
        let mut model = numbers_model(25);
        model.update(Message::NextPage).unwrap();
        assert_eq!(model.get_uidata().current_page, 2);

        model.update(Message::Search).unwrap();
        type_key(&mut model, KeyCode::Char('1'));
        assert_eq!(model.get_uidata().current_page, 1);
    }

    #[test]
    fn page_jump_is_clamped() {
        let mut model = numbers_model(25);
        model.update(Message::JumpToPage).unwrap();
        type_key(&mut model, KeyCode::Char('9'));
        type_key(&mut model, KeyCode::Char('9'));
        type_key(&mut model, KeyCode::Enter);
        assert_eq!(model.get_uidata().current_page, 3);
    }

    #[test]
    fn cycling_the_filter_column_wraps_and_resets_the_page() {
        let mut model = people_model();
        assert_eq!(model.get_uidata().filter_column, "name");
        model.update(Message::CycleFilterColumn).unwrap();
        assert_eq!(model.get_uidata().filter_column, "amount");
        model.update(Message::CycleFilterColumn).unwrap();
        assert_eq!(model.get_uidata().filter_column, "id");
        assert_eq!(model.get_uidata().current_page, 1);
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = people_model();
        model.update(Message::Help).unwrap();
        assert!(model.get_uidata().show_popup);
        // Other messages are ignored while the popup is open.
        model.update(Message::NextPage).unwrap();
        assert_eq!(model.get_uidata().current_page, 1);
        model.update(Message::Exit).unwrap();
        assert!(!model.get_uidata().show_popup);
    }

    #[test]
    fn an_empty_table_renders_an_empty_single_page() {
        let table = Table::from_json_str("empty", "[]").unwrap();
        let mut model = Model::init(&AppConfig::default(), table);
        let ui = model.get_uidata();
        assert!(ui.columns.is_empty());
        assert!(ui.rows.is_empty());
        assert_eq!(ui.total_pages, 1);
        // Transitions on the empty table are harmless no-ops.
        model.update(Message::ActivateColumn).unwrap();
        model.update(Message::NextPage).unwrap();
        model.update(Message::CycleFilterColumn).unwrap();
        assert_eq!(model.get_uidata().current_page, 1);
    }

    #[test]
    fn csv_escaping_wraps_and_doubles_quotes() {
        assert_eq!(Model::wrap_cell_content("plain"), "plain");
        assert_eq!(Model::wrap_cell_content("a,b"), "\"a,b\"");
        assert_eq!(Model::wrap_cell_content("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
