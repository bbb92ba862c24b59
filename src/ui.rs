use chrono::NaiveDate;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState},
};

use crate::domain::{AppConfig, InputMode};
use crate::model::{Model, UiData};
use crate::table::Value;
use crate::view::SortDirection;

pub const COLUMN_WIDTH_MARGIN: usize = 2;

// Badge colors for the name column, picked by the first character.
const AVATAR_COLORS: [Color; 8] = [
    Color::Magenta,
    Color::Green,
    Color::LightRed,
    Color::Blue,
    Color::LightMagenta,
    Color::Cyan,
    Color::Red,
    Color::Yellow,
];

pub struct TableUi {
    max_column_width: usize,
}

impl TableUi {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            max_column_width: cfg.max_column_width,
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, info_area, cmd_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.draw_table(uidata, frame, table_area);
        self.draw_info(uidata, frame, info_area);
        self.draw_cmdline(uidata, frame, cmd_area);
        if uidata.show_popup {
            self.draw_popup(uidata, frame);
        }
    }

    fn draw_table(&self, uidata: &UiData, frame: &mut Frame, area: Rect) {
        let title = Line::from(format!(" {} ", uidata.name).bold());
        let instructions = Line::from(vec![
            " Sort ".into(),
            "<Enter>".blue().bold(),
            " Search ".into(),
            "</>".blue().bold(),
            " Filter ".into(),
            "<f>".blue().bold(),
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<q> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.centered());

        if uidata.columns.is_empty() {
            let empty = Paragraph::new("The dataset is empty.").centered().block(block);
            frame.render_widget(empty, area);
            return;
        }

        let widths = self.column_widths(uidata);
        let header = Row::new(
            uidata
                .columns
                .iter()
                .enumerate()
                .map(|(idx, column)| Self::header_cell(uidata, idx, column)),
        )
        .style(Style::new().bold());
        let rows = uidata.rows.iter().map(|row| {
            Row::new(
                row.iter()
                    .enumerate()
                    .map(|(idx, value)| Self::data_cell(&uidata.columns[idx], value)),
            )
        });

        let table = Table::new(rows, widths.into_iter().map(|w| Constraint::Length(w as u16)))
            .header(header)
            .block(block)
            .column_spacing(1)
            .row_highlight_style(Style::new().reversed());
        let mut state = TableState::default().with_selected(Some(uidata.selected_row));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn header_cell(uidata: &UiData, idx: usize, column: &str) -> Cell<'static> {
        let indicator = match &uidata.sort {
            Some(sort) if sort.key == column => match sort.direction {
                SortDirection::Ascending => "▲".blue(),
                SortDirection::Descending => "▼".blue(),
            },
            _ => "↕".dark_gray(),
        };
        let name = if idx == uidata.active_column {
            Span::raw(format!("{column} ")).yellow().underlined()
        } else {
            Span::raw(format!("{column} "))
        };
        Cell::from(Line::from(vec![name, indicator]))
    }

    fn data_cell(column: &str, value: &Value) -> Cell<'static> {
        match column {
            "name" => {
                let text = value.to_string();
                let initial = text
                    .chars()
                    .next()
                    .map(|c| c.to_ascii_uppercase())
                    .unwrap_or('?');
                let color = text
                    .chars()
                    .next()
                    .map(|c| AVATAR_COLORS[c as usize % AVATAR_COLORS.len()])
                    .unwrap_or(AVATAR_COLORS[0]);
                Cell::from(Line::from(vec![
                    Span::styled(format!(" {initial} "), Style::new().fg(Color::Black).bg(color)),
                    Span::raw(" "),
                    Span::raw(text),
                ]))
            }
            "status" => {
                let text = value.to_string();
                let color = match text.as_str() {
                    "Active" => Color::Green,
                    "Inactive" => Color::Red,
                    _ => Color::Yellow,
                };
                Cell::from(Span::styled(text, Style::new().fg(color)))
            }
            _ => Cell::from(format_cell(column, value)),
        }
    }

    fn column_widths(&self, uidata: &UiData) -> Vec<usize> {
        uidata
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                // Header text plus the sort indicator.
                let header = column.chars().count() + 2;
                let cells = uidata
                    .rows
                    .iter()
                    .map(|row| {
                        let mut width = format_cell(column, &row[idx]).chars().count();
                        if column == "name" {
                            width += 4; // initial badge
                        }
                        width
                    })
                    .max()
                    .unwrap_or(0);
                std::cmp::min(header.max(cells) + COLUMN_WIDTH_MARGIN, self.max_column_width)
            })
            .collect()
    }

    fn draw_info(&self, uidata: &UiData, frame: &mut Frame, area: Rect) {
        let mut spans: Vec<Span> = vec![
            format!(
                " Page {} of {} · {} rows",
                uidata.current_page, uidata.total_pages, uidata.total_matching
            )
            .into(),
            format!(" · filter: {}", uidata.filter_column).into(),
        ];
        if !uidata.search_query.is_empty() {
            spans.push(format!(" · \"{}\"", uidata.search_query).yellow());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_cmdline(&self, uidata: &UiData, frame: &mut Frame, area: Rect) {
        if let Some(mode) = uidata.input_mode {
            let prompt = match mode {
                InputMode::Search => "/",
                InputMode::PageJump => "page: ",
            };
            let text = format!("{prompt}{}", uidata.cmdinput.input);
            frame.render_widget(Paragraph::new(text), area);
            let cursor_x =
                area.x + (prompt.chars().count() + uidata.cmdinput.curser_pos) as u16;
            frame.set_cursor_position(Position::new(
                cursor_x.min(area.right().saturating_sub(1)),
                area.y,
            ));
        } else {
            let status = Paragraph::new(format!(" {}", uidata.status_message)).dark_gray();
            frame.render_widget(status, area);
        }
    }

    fn draw_popup(&self, uidata: &UiData, frame: &mut Frame) {
        let area = Self::centered_rect(frame.area(), 50, 17);
        frame.render_widget(Clear, area);
        let block = Block::bordered().title(Line::from(" help ".bold()).centered());
        frame.render_widget(
            Paragraph::new(uidata.popup_message.as_str()).block(block),
            area,
        );
    }

    fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
        let width = width.min(area.width);
        let height = height.min(area.height);
        Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        }
    }
}

/// Per-column display formatting. Purely cosmetic; the pipeline filters and
/// sorts on the raw values, never on these strings.
pub(crate) fn format_cell(column: &str, value: &Value) -> String {
    match (column, value) {
        ("amount", Value::Number(n)) => format!("${}", group_thousands(*n)),
        ("date", Value::Str(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|_| s.clone()),
        _ => value.to_string(),
    }
}

fn group_thousands(n: f64) -> String {
    let raw = format!("{n}");
    let (sign, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest.to_string()),
        None => ("", raw.clone()),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int, frac)) => (int.to_string(), Some(frac.to_string())),
        None => (unsigned, None),
    };
    // Scientific notation and other oddities pass through untouched.
    if int_part.is_empty() || int_part.bytes().any(|b| !b.is_ascii_digit()) {
        return raw;
    }
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_are_comma_grouped() {
        assert_eq!(group_thousands(100.0), "100");
        assert_eq!(group_thousands(1234.0), "1,234");
        assert_eq!(group_thousands(1234567.5), "1,234,567.5");
        assert_eq!(group_thousands(-50000.0), "-50,000");
    }

    #[test]
    fn amounts_render_as_currency() {
        assert_eq!(format_cell("amount", &Value::Number(1234.0)), "$1,234");
        // Non-numeric amounts stay as they are.
        assert_eq!(format_cell("amount", &Value::Str("n/a".into())), "n/a");
    }

    #[test]
    fn dates_render_in_day_first_order() {
        assert_eq!(
            format_cell("date", &Value::Str("2024-01-15".into())),
            "15/01/2024"
        );
        assert_eq!(
            format_cell("date", &Value::Str("not a date".into())),
            "not a date"
        );
    }

    #[test]
    fn plain_columns_use_the_display_form() {
        assert_eq!(format_cell("id", &Value::Number(7.0)), "7");
        assert_eq!(format_cell("note", &Value::Null), "");
    }
}
