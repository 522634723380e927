use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{poll, read, Event, KeyEvent, KeyEventKind},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        disable_raw_mode, enable_raw_mode, size, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::io::{self, stdout, Write};
use std::time::Duration;

/// Terminal abstraction for rendering
pub struct Terminal {
    width: u16,
    height: u16,
    buffer: Vec<Vec<Cell>>,
    alternate_screen: bool,
}

/// A single cell in the terminal buffer
#[derive(Clone, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: None,
            bg: None,
            bold: false,
        }
    }
}

impl Terminal {
    /// Initialize the terminal for drawing
    pub fn new(alternate_screen: bool) -> io::Result<Self> {
        let (width, height) = size()?;

        if alternate_screen {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        }

        Ok(Self {
            width,
            height,
            buffer: vec![vec![Cell::default(); width as usize]; height as usize],
            alternate_screen,
        })
    }

    /// Get terminal dimensions
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Pick up a changed window size. Returns true if it changed.
    pub fn refresh_size(&mut self) -> io::Result<bool> {
        let (width, height) = size()?;
        if (width, height) == (self.width, self.height) {
            return Ok(false);
        }
        self.width = width;
        self.height = height;
        self.buffer = vec![vec![Cell::default(); width as usize]; height as usize];
        execute!(stdout(), Clear(ClearType::All))?;
        Ok(true)
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        for row in &mut self.buffer {
            row.fill(Cell::default());
        }
    }

    /// Set a character at position with optional color
    pub fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bold: bool) {
        self.set_with_bg(x, y, ch, fg, None, bold);
    }

    /// Set a character with both foreground and background color
    pub fn set_with_bg(
        &mut self,
        x: i32,
        y: i32,
        ch: char,
        fg: Option<Color>,
        bg: Option<Color>,
        bold: bool,
    ) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize][x as usize] = Cell { ch, fg, bg, bold };
        }
    }

    /// Set a string starting at position
    pub fn set_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Color>, bold: bool) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i as i32, y, ch, fg, bold);
        }
    }

    /// Render the entire buffer to screen
    pub fn render(&self) -> io::Result<()> {
        let mut stdout = stdout().lock();

        for (y, row) in self.buffer.iter().enumerate() {
            queue!(stdout, MoveTo(0, y as u16))?;
            let mut fg = None;
            let mut bg = None;

            for cell in row {
                if cell.fg != fg {
                    match cell.fg {
                        Some(color) => queue!(stdout, SetForegroundColor(color))?,
                        None => queue!(stdout, SetForegroundColor(Color::Reset))?,
                    }
                    fg = cell.fg;
                }
                if cell.bg != bg {
                    match cell.bg {
                        Some(color) => queue!(stdout, SetBackgroundColor(color))?,
                        None => queue!(stdout, SetBackgroundColor(Color::Reset))?,
                    }
                    bg = cell.bg;
                }

                if cell.bold {
                    queue!(stdout, SetAttribute(Attribute::Bold), Print(cell.ch), SetAttribute(Attribute::NormalIntensity))?;
                } else {
                    queue!(stdout, Print(cell.ch))?;
                }
            }
            queue!(stdout, ResetColor)?;
        }

        stdout.flush()
    }

    /// Wait up to `timeout` for a key press
    pub fn wait_key(&self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        if poll(timeout)? {
            if let Event::Key(key_event) = read()? {
                if key_event.kind != KeyEventKind::Release {
                    return Ok(Some(key_event));
                }
            }
        }
        Ok(None)
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.alternate_screen {
            let _ = execute!(stdout(), ResetColor, Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
        }
    }
}
